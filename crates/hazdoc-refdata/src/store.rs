use std::collections::BTreeMap;

use thiserror::Error;

use crate::table::{Table, TableData};

/// Backend-level failure behind a fetch or append.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("table does not exist")]
    MissingTable,
    #[error("missing column `{0}`")]
    MissingColumn(String),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum RefDataError {
    #[error("failed to fetch reference table `{table}`")]
    Fetch {
        table: Table,
        #[source]
        source: StoreError,
    },
    #[error("failed to append to reference table `{table}`")]
    Append {
        table: Table,
        #[source]
        source: StoreError,
    },
    #[error("{0} name is required")]
    MissingName(&'static str),
}

impl RefDataError {
    pub fn fetch(table: Table, source: impl Into<StoreError>) -> Self {
        Self::Fetch {
            table,
            source: source.into(),
        }
    }

    pub fn append(table: Table, source: impl Into<StoreError>) -> Self {
        Self::Append {
            table,
            source: source.into(),
        }
    }

    /// `true` when the failure is a table the backend does not have.
    pub fn is_missing_table(&self) -> bool {
        matches!(
            self,
            RefDataError::Fetch {
                source: StoreError::MissingTable,
                ..
            }
        )
    }
}

/// The spreadsheet backend holding the reference tables.
///
/// Calls block and are never retried; failures surface as [`RefDataError::Fetch`] /
/// [`RefDataError::Append`].
pub trait ReferenceDataStore {
    fn fetch_table(&self, table: Table) -> Result<TableData, RefDataError>;

    /// Append one row after the table's last row.
    fn append_row(&mut self, table: Table, values: &[String]) -> Result<(), RefDataError>;
}

impl<S: ReferenceDataStore + ?Sized> ReferenceDataStore for Box<S> {
    fn fetch_table(&self, table: Table) -> Result<TableData, RefDataError> {
        (**self).fetch_table(table)
    }

    fn append_row(&mut self, table: Table, values: &[String]) -> Result<(), RefDataError> {
        (**self).append_row(table, values)
    }
}

/// Raw sheet values held in memory. Tables that were never set are missing.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<Table, Vec<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a table's raw values (header row first, except for the equipment table).
    pub fn set_table<R, C>(&mut self, table: Table, values: R) -> &mut Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.tables.insert(table, values);
        self
    }

    pub fn with_table<R, C>(mut self, table: Table, values: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        self.set_table(table, values);
        self
    }

    pub fn raw(&self, table: Table) -> Option<&[Vec<String>]> {
        self.tables.get(&table).map(Vec::as_slice)
    }
}

impl ReferenceDataStore for MemoryStore {
    fn fetch_table(&self, table: Table) -> Result<TableData, RefDataError> {
        let values = self
            .tables
            .get(&table)
            .ok_or_else(|| RefDataError::fetch(table, StoreError::MissingTable))?;
        Ok(TableData::from_values(table, values.clone()))
    }

    fn append_row(&mut self, table: Table, values: &[String]) -> Result<(), RefDataError> {
        let rows = self
            .tables
            .get_mut(&table)
            .ok_or_else(|| RefDataError::append(table, StoreError::MissingTable))?;
        rows.push(values.to_vec());
        Ok(())
    }
}

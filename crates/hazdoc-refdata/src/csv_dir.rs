use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::store::{RefDataError, ReferenceDataStore, StoreError};
use crate::table::{Table, TableData};

/// Reference tables stored as `<sheet name>.csv` files in one directory.
#[derive(Debug, Clone)]
pub struct CsvDirStore {
    dir: PathBuf,
}

impl CsvDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.dir.join(format!("{}.csv", table.sheet_name()))
    }

    fn read_values(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            // Header handling depends on the table, see `TableData::from_values`.
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            values.push(record.iter().map(str::to_string).collect());
        }
        Ok(values)
    }

    fn append_values(path: &Path, values: &[String]) -> Result<(), StoreError> {
        let mut file = OpenOptions::new().read(true).append(true).open(path)?;
        if !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        writer.write_record(values)?;
        writer.flush()?;
        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl ReferenceDataStore for CsvDirStore {
    fn fetch_table(&self, table: Table) -> Result<TableData, RefDataError> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(RefDataError::fetch(table, StoreError::MissingTable));
        }
        let values = Self::read_values(&path).map_err(|err| RefDataError::fetch(table, err))?;
        log::debug!("read {} row(s) from {}", values.len(), path.display());
        Ok(TableData::from_values(table, values))
    }

    fn append_row(&mut self, table: Table, values: &[String]) -> Result<(), RefDataError> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(RefDataError::append(table, StoreError::MissingTable));
        }
        Self::append_values(&path, values).map_err(|err| RefDataError::append(table, err))?;
        log::info!("appended a row to {}", path.display());
        Ok(())
    }
}

//! Reference data behind the declaration form.
//!
//! The tables (cargo, equipment types, shippers, consignees, ports, vessels) live in an external
//! spreadsheet reached through [`ReferenceDataStore`]. [`ReferenceData`] keeps the assembled
//! [`MasterData`] in a TTL cache and drops it after every successful append, so a row added
//! through the form is offered on the very next read.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use hazdoc_cache::{TtlCache, DEFAULT_TTL};

mod csv_dir;
mod master;
mod prefill;
mod store;
mod table;

pub use csv_dir::CsvDirStore;
pub use master::{CargoDetails, MasterData, ShipperContact};
pub use prefill::prefill;
pub use store::{MemoryStore, RefDataError, ReferenceDataStore, StoreError};
pub use table::{Table, TableData, UnknownTable, EQUIPMENT_COLUMN};

/// Input for [`ReferenceData::add_shipper`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewShipper {
    pub name: String,
    pub contact_name: String,
    pub contact_number: String,
    pub address: String,
}

/// A store plus a cached view of its tables.
#[derive(Debug)]
pub struct ReferenceData<S> {
    store: S,
    cache: TtlCache<(), Arc<MasterData>>,
}

impl<S: ReferenceDataStore> ReferenceData<S> {
    pub fn new(store: S) -> Self {
        Self::with_ttl(store, DEFAULT_TTL)
    }

    pub fn with_ttl(store: S, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(NonZeroUsize::MIN, ttl),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The assembled master data, fetched from the store when the cache is cold or expired.
    pub fn master_data(&mut self) -> Result<Arc<MasterData>, RefDataError> {
        let store = &self.store;
        self.cache
            .get_or_try_insert_with((), || MasterData::load(store).map(Arc::new))
    }

    /// One table as stored, bypassing the cache.
    pub fn table(&self, table: Table) -> Result<TableData, RefDataError> {
        self.store.fetch_table(table)
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    fn append(&mut self, table: Table, values: Vec<String>) -> Result<(), RefDataError> {
        self.store.append_row(table, &values)?;
        self.invalidate();
        Ok(())
    }

    pub fn add_shipper(&mut self, shipper: &NewShipper) -> Result<(), RefDataError> {
        let name = required(&shipper.name, "shipper")?;
        self.append(
            Table::Shippers,
            vec![
                name,
                shipper.contact_name.trim().to_string(),
                shipper.contact_number.trim().to_string(),
                shipper.address.trim().to_string(),
            ],
        )
    }

    pub fn add_consignee(&mut self, name: &str, address: &str) -> Result<(), RefDataError> {
        let name = required(name, "consignee")?;
        self.append(Table::Consignees, vec![name, address.trim().to_string()])
    }

    /// Ports rows are `POL, POD`; a new discharge port leaves the loading column blank.
    pub fn add_pod(&mut self, pod: &str) -> Result<(), RefDataError> {
        let pod = required(pod, "port of discharge")?;
        self.append(Table::Ports, vec![String::new(), pod])
    }

    pub fn add_vessel(&mut self, name: &str) -> Result<(), RefDataError> {
        let name = required(name, "vessel")?;
        self.append(Table::Vessels, vec![name])
    }
}

fn required(value: &str, what: &'static str) -> Result<String, RefDataError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RefDataError::MissingName(what));
    }
    Ok(value.to_string())
}

use std::collections::BTreeMap;

use serde::Serialize;

use hazdoc_model::{normalize, FieldMap};

use crate::store::{RefDataError, ReferenceDataStore, StoreError};
use crate::table::{Table, TableData, EQUIPMENT_COLUMN};

pub const CARGO_NAME_COLUMN: &str = "Proper Shipping Name";
pub const SHIPPER_COLUMN: &str = "Shipper";
pub const SHIPPER_CONTACT_NAME_COLUMN: &str = "ContactName";
pub const SHIPPER_CONTACT_NUMBER_COLUMN: &str = "ContactNumber";
pub const SHIPPER_ADDRESS_COLUMN: &str = "Shipper_Address";
pub const CONSIGNEE_COLUMN: &str = "Consignee";
pub const CONSIGNEE_ADDRESS_COLUMN: &str = "Consignee_Address";
pub const POL_COLUMN: &str = "POL";
pub const POD_COLUMN: &str = "POD";
pub const VESSEL_COLUMN: &str = "Vessel_Name";

/// Dangerous-goods details for one proper shipping name, keyed canonically
/// (`TECHNICAL_NAME`, `CLASS`, `UNNO`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CargoDetails {
    pub fields: FieldMap,
}

impl CargoDetails {
    /// Display text of one detail, empty when the cargo sheet has no such column.
    pub fn text(&self, key: &str) -> String {
        self.fields.display(key).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShipperContact {
    pub contact_name: String,
    pub contact_number: String,
    pub address: String,
}

/// Everything the declaration form offers for selection, assembled from the reference tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MasterData {
    pub cargo: BTreeMap<String, CargoDetails>,
    pub equipment_types: Vec<String>,
    pub shippers: Vec<String>,
    pub shipper_contacts: BTreeMap<String, ShipperContact>,
    pub consignees: Vec<String>,
    pub consignee_addresses: BTreeMap<String, String>,
    pub pol_ports: Vec<String>,
    pub pod_ports: Vec<String>,
    pub vessels: Vec<String>,
}

fn require_column(table: Table, data: &TableData, column: &str) -> Result<usize, RefDataError> {
    data.column_index(column)
        .ok_or_else(|| RefDataError::fetch(table, StoreError::MissingColumn(column.to_string())))
}

fn cell(data: &TableData, row: usize, column: Option<usize>) -> String {
    column
        .map(|idx| data.rows[row][idx].clone())
        .unwrap_or_default()
}

impl MasterData {
    /// Fetch every reference table and assemble the selection lists.
    ///
    /// A missing `Vessels` table yields an empty vessel list; every other failure is returned.
    pub fn load<S: ReferenceDataStore + ?Sized>(store: &S) -> Result<Self, RefDataError> {
        let cargo = store.fetch_table(Table::Cargo)?;
        let equipment = store.fetch_table(Table::EquipmentTypes)?;
        let shippers = store.fetch_table(Table::Shippers)?;
        let consignees = store.fetch_table(Table::Consignees)?;
        let ports = store.fetch_table(Table::Ports)?;
        let vessels = match store.fetch_table(Table::Vessels) {
            Ok(vessels) => vessels,
            Err(err) if err.is_missing_table() => {
                log::debug!("no vessel table; offering an empty vessel list");
                TableData::default()
            }
            Err(err) => return Err(err),
        };

        let mut data = MasterData {
            equipment_types: equipment.non_blank(EQUIPMENT_COLUMN),
            pol_ports: ports.non_blank(POL_COLUMN),
            pod_ports: ports.non_blank(POD_COLUMN),
            vessels: vessels.non_blank(VESSEL_COLUMN),
            ..MasterData::default()
        };
        data.load_cargo(&cargo)?;
        data.load_shippers(&shippers)?;
        data.load_consignees(&consignees)?;
        log::debug!(
            "reference data: {} cargo, {} shipper(s), {} consignee(s), {} vessel(s)",
            data.cargo.len(),
            data.shippers.len(),
            data.consignees.len(),
            data.vessels.len()
        );
        Ok(data)
    }

    fn load_cargo(&mut self, cargo: &TableData) -> Result<(), RefDataError> {
        if cargo.columns.is_empty() {
            return Ok(());
        }
        let name_idx = require_column(Table::Cargo, cargo, CARGO_NAME_COLUMN)?;
        for (row, values) in cargo.rows.iter().enumerate() {
            let (Some(name), Some(record)) = (values.get(name_idx), cargo.record(row)) else {
                continue;
            };
            let name = name.clone();
            let details = normalize(record.filter(|(col, _)| *col != CARGO_NAME_COLUMN));
            self.cargo.insert(name, CargoDetails { fields: details });
        }
        Ok(())
    }

    fn load_shippers(&mut self, shippers: &TableData) -> Result<(), RefDataError> {
        if shippers.columns.is_empty() {
            return Ok(());
        }
        let name_idx = require_column(Table::Shippers, shippers, SHIPPER_COLUMN)?;
        let contact_name = shippers.column_index(SHIPPER_CONTACT_NAME_COLUMN);
        let contact_number = shippers.column_index(SHIPPER_CONTACT_NUMBER_COLUMN);
        let address = shippers.column_index(SHIPPER_ADDRESS_COLUMN);
        for (row, values) in shippers.rows.iter().enumerate() {
            let name = &values[name_idx];
            if name.trim().is_empty() {
                continue;
            }
            self.shippers.push(name.clone());
            self.shipper_contacts.insert(
                name.clone(),
                ShipperContact {
                    contact_name: cell(shippers, row, contact_name),
                    contact_number: cell(shippers, row, contact_number),
                    address: cell(shippers, row, address),
                },
            );
        }
        Ok(())
    }

    fn load_consignees(&mut self, consignees: &TableData) -> Result<(), RefDataError> {
        if consignees.columns.is_empty() {
            return Ok(());
        }
        let name_idx = require_column(Table::Consignees, consignees, CONSIGNEE_COLUMN)?;
        let address = consignees.column_index(CONSIGNEE_ADDRESS_COLUMN);
        for (row, values) in consignees.rows.iter().enumerate() {
            let name = &values[name_idx];
            if name.trim().is_empty() {
                continue;
            }
            self.consignees.push(name.clone());
            self.consignee_addresses
                .insert(name.clone(), cell(consignees, row, address));
        }
        Ok(())
    }
}

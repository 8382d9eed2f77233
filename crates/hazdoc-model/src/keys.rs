//! Canonical field keys and the mapping from reference-data column names onto them.

use crate::fields::{FieldMap, FieldValue};

pub const SHIPPER: &str = "SHIPPER";
pub const SHIPPER_CONTACT_NAME: &str = "SHIPPER_CONTACT_NAME";
pub const SHIPPER_CONTACT_NUMBER: &str = "SHIPPER_CONTACT_NUMBER";
pub const SHIPPER_ADDRESS: &str = "SHIPPER_ADDRESS";
pub const CONSIGNEE: &str = "CONSIGNEE";
pub const CONSIGNEE_ADDRESS: &str = "CONSIGNEE_ADDRESS";
pub const POL: &str = "POL";
pub const POD: &str = "POD";
pub const VESSEL: &str = "VESSEL";
pub const CARGO: &str = "CARGO";
pub const TECHNICAL_NAME: &str = "TECHNICAL_NAME";
pub const CLASS: &str = "CLASS";
pub const UNNO: &str = "UNNO";
pub const SUBRISK: &str = "SUBRISK";
pub const PACKING_GROUP: &str = "PACKING_GROUP";
pub const EMS: &str = "EMS";
pub const FLASH_POINT: &str = "FLASH_POINT";
pub const MARINE_POLLUTANT: &str = "MARINE_POLLUTANT";
pub const LIMITED_QUANTITY: &str = "LIMITED_QUANTITY";
pub const NATURE_OF_CARGO: &str = "NATURE_OF_CARGO";
pub const MFAG_NUMBER: &str = "MFAG_NUMBER";
pub const OUTER_PACKAGE: &str = "OUTER_PACKAGE";
pub const INNER_PACKAGE: &str = "INNER_PACKAGE";
pub const GROSS_WT: &str = "GROSS_WT";
pub const NET_WT: &str = "NET_WT";
pub const EQUIPMENT_TYPE: &str = "EQUIPMENT_TYPE";
pub const QTY_EQUIPMENT: &str = "QTY_EQUIPMENT";
pub const QUANTITY: &str = "QUANTITY";
pub const CONTAINER_NUMBER: &str = "CONTAINER_NUMBER";
pub const SEAL_NUMBER: &str = "SEAL_NUMBER";

/// Fields whose values are multi-line addresses. Spreadsheet fills turn on wrap text for them.
pub const ADDRESS_KEYS: [&str; 2] = [SHIPPER_ADDRESS, CONSIGNEE_ADDRESS];

/// Source column names that do not follow the "spaces to underscores" rule.
///
/// Matched exactly; `"Limited Quantity "` carries a trailing space in the cargo sheet.
pub const RENAMES: &[(&str, &str)] = &[
    ("technicalName", TECHNICAL_NAME),
    ("class", CLASS),
    ("unno", UNNO),
    ("subrisk", SUBRISK),
    ("packingGroup", PACKING_GROUP),
    ("ems", EMS),
    ("flashPoint", FLASH_POINT),
    ("marinePollutant", MARINE_POLLUTANT),
    ("Limited Quantity ", LIMITED_QUANTITY),
    ("natureOfCargo", NATURE_OF_CARGO),
    ("MFAG Number", MFAG_NUMBER),
];

pub fn is_address_key(key: &str) -> bool {
    ADDRESS_KEYS.contains(&key)
}

/// Map one source column name to its canonical key.
pub fn normalize_key(raw: &str) -> String {
    RENAMES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or_else(|| raw.replace(' ', "_"))
}

/// Rename every key of `raw` to canonical form, keeping values and order.
///
/// When two source keys collapse onto the same canonical key the later value wins, at the
/// position of the first.
pub fn normalize<'a, I, V>(raw: I) -> FieldMap
where
    I: IntoIterator<Item = (&'a str, V)>,
    V: Into<FieldValue>,
{
    raw.into_iter()
        .map(|(k, v)| (normalize_key(k), v))
        .collect()
}

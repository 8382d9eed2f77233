use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The reference tables, named after the sheets that hold them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Table {
    Cargo,
    EquipmentTypes,
    Shippers,
    Consignees,
    Ports,
    Vessels,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Cargo,
        Table::EquipmentTypes,
        Table::Shippers,
        Table::Consignees,
        Table::Ports,
        Table::Vessels,
    ];

    pub fn sheet_name(self) -> &'static str {
        match self {
            Table::Cargo => "cargo",
            Table::EquipmentTypes => "Equipment Type",
            Table::Shippers => "Shippers",
            Table::Consignees => "Consignees",
            Table::Ports => "Ports",
            Table::Vessels => "Vessels",
        }
    }

    /// The equipment sheet is a bare list without a header row.
    pub fn has_header(self) -> bool {
        self != Table::EquipmentTypes
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown reference table `{0}`")]
pub struct UnknownTable(pub String);

impl FromStr for Table {
    type Err = UnknownTable;

    /// Accepts the sheet name or a lowercase alias (`equipment`, `shippers`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Table::ALL
            .into_iter()
            .find(|table| table.sheet_name().eq_ignore_ascii_case(wanted))
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "equipment" | "equipment-types" | "equipment_types" => {
                    Some(Table::EquipmentTypes)
                }
                "shipper" => Some(Table::Shippers),
                "consignee" => Some(Table::Consignees),
                "port" => Some(Table::Ports),
                "vessel" => Some(Table::Vessels),
                _ => None,
            })
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}

/// Column name used for the header-less equipment sheet.
pub const EQUIPMENT_COLUMN: &str = "Equipment Type";

/// A fetched table: a header row and data rows of exactly the header's width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableData {
    /// Shape raw sheet values the way every reader expects them.
    ///
    /// The first row is the header (except for [`Table::EquipmentTypes`], whose rows all sit
    /// under [`EQUIPMENT_COLUMN`]). Short rows are padded with `""`, long rows truncated.
    pub fn from_values(table: Table, values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut values = values.into_iter();
        let columns = if table.has_header() {
            values.next().unwrap_or_default()
        } else {
            vec![EQUIPMENT_COLUMN.to_string()]
        };
        let width = columns.len();
        let rows = values
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// Non-blank values of one column; an absent column yields nothing.
    pub fn non_blank(&self, name: &str) -> Vec<String> {
        self.column(name)
            .into_iter()
            .flatten()
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Column name / value pairs for one row, `None` past the last row.
    pub fn record(&self, row: usize) -> Option<impl Iterator<Item = (&str, &str)>> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str)),
        )
    }
}

//! Spreadsheet template filling.
//!
//! A template is a regular workbook whose string cells contain `{{KEY}}` tokens. Filling
//! rewrites only the cells that actually change:
//!
//! - worksheets are streamed cell by cell; untouched cells are re-emitted as read;
//! - new strings are appended to `xl/sharedStrings.xml`;
//! - address fields get a wrap-text clone of their cell format in `xl/styles.xml`.
//!
//! Every other part of the package is carried over byte-for-byte.

use std::collections::BTreeSet;

use thiserror::Error;

use hazdoc_model::FieldMap;
use hazdoc_opc::{rewrite_override_content_type, OpcError, OpcPackage};

mod shared_strings;
mod styles;
mod tokens;
mod workbook;
mod worksheet;
mod xml;

pub use tokens::placeholder_keys;
pub use workbook::{SheetPart, TEMPLATE_CONTENT_TYPE, WORKBOOK_CONTENT_TYPE};

use shared_strings::SharedStrings;
use styles::StyleSheet;
use workbook::WorkbookLayout;
use worksheet::FillContext;

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error(transparent)]
    Package(#[from] OpcError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
}

/// A loaded workbook template. Filling never mutates it, so one template can serve many fills.
#[derive(Debug, Clone)]
pub struct XlsxTemplate {
    package: OpcPackage,
    layout: WorkbookLayout,
}

impl XlsxTemplate {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub fn from_package(package: OpcPackage) -> Result<Self, XlsxError> {
        let layout = workbook::locate(&package)?;
        log::debug!(
            "workbook {} with {} worksheet(s)",
            layout.workbook,
            layout.sheets.len()
        );
        Ok(Self { package, layout })
    }

    pub fn sheets(&self) -> &[SheetPart] {
        &self.layout.sheets
    }

    /// `true` for `.xltx`-style packages.
    pub fn is_template(&self) -> bool {
        workbook::is_template(&self.package)
    }

    fn shared_strings(&self) -> Result<Option<SharedStrings>, XlsxError> {
        self.layout
            .shared_strings
            .as_deref()
            .and_then(|name| self.package.part(name))
            .map(SharedStrings::parse)
            .transpose()
    }

    /// Inner text of every `{{...}}` token found in a string cell.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, XlsxError> {
        let shared_strings = self.shared_strings()?;
        let mut keys = BTreeSet::new();
        for sheet in &self.layout.sheets {
            let Some(xml) = self.package.part(&sheet.part) else {
                continue;
            };
            for text in worksheet::string_cells(xml, shared_strings.as_ref())? {
                keys.extend(placeholder_keys(&text).map(str::to_string));
            }
        }
        Ok(keys)
    }

    /// Substitute `fields` into a copy of the template package.
    ///
    /// A template (`.xltx`) content type is switched to a regular workbook so the result opens
    /// as an `.xlsx`.
    pub fn fill(&self, fields: &FieldMap) -> Result<OpcPackage, XlsxError> {
        let mut package = self.package.clone();
        let mut shared_strings = self.shared_strings()?;
        let mut styles = self
            .layout
            .styles
            .as_deref()
            .and_then(|name| package.part(name))
            .map(StyleSheet::parse)
            .transpose()?;

        let mut cells_changed = 0usize;
        for sheet in &self.layout.sheets {
            let Some(xml) = package.part(&sheet.part) else {
                log::warn!("worksheet part {} for sheet `{}` is missing", sheet.part, sheet.name);
                continue;
            };
            let mut ctx = FillContext {
                fields,
                shared_strings: shared_strings.as_mut(),
                styles: styles.as_mut(),
                cells_changed: 0,
            };
            let filled = worksheet::fill_worksheet(xml, &mut ctx)?;
            cells_changed += ctx.cells_changed;
            if let Some(filled) = filled {
                package.set_part(sheet.part.clone(), filled);
            }
        }

        if let (Some(name), Some(table)) = (&self.layout.shared_strings, &shared_strings) {
            if let Some(bytes) = table.write_if_dirty()? {
                package.set_part(name.clone(), bytes);
            }
        }
        if let (Some(name), Some(styles)) = (&self.layout.styles, &styles) {
            if let Some(bytes) = styles.write_if_dirty()? {
                package.set_part(name.clone(), bytes);
            }
        }

        if self.is_template() {
            let content_types = package.require_part("[Content_Types].xml")?;
            if let Some(rewritten) = rewrite_override_content_type(
                content_types,
                &self.layout.workbook,
                WORKBOOK_CONTENT_TYPE,
            )? {
                package.set_part("[Content_Types].xml", rewritten);
            }
        }

        log::debug!("filled {cells_changed} cell(s)");
        Ok(package)
    }
}

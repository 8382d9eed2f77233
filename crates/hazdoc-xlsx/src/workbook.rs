use std::collections::HashMap;

use hazdoc_opc::path::{rels_part_name, resolve_target};
use hazdoc_opc::{parse_relationships, OpcPackage, Relationship};

use crate::XlsxError;

const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
pub const TEMPLATE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml";

/// One `<sheet>` from `xl/workbook.xml` resolved to its worksheet part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPart {
    pub name: String,
    pub part: String,
}

/// Where the parts a fill touches live inside the package.
#[derive(Debug, Clone)]
pub(crate) struct WorkbookLayout {
    pub(crate) workbook: String,
    pub(crate) sheets: Vec<SheetPart>,
    pub(crate) shared_strings: Option<String>,
    pub(crate) styles: Option<String>,
}

fn office_document_part(package: &OpcPackage) -> Result<String, XlsxError> {
    if let Some(root_rels) = package.part("_rels/.rels") {
        let rels = parse_relationships(root_rels)?;
        if let Some(rel) = rels.iter().find(|rel| rel.has_kind("officeDocument")) {
            return Ok(resolve_target("", &rel.target));
        }
    }
    Ok("xl/workbook.xml".to_string())
}

/// Read the sheet list and resolve every worksheet, shared string and style part.
pub(crate) fn locate(package: &OpcPackage) -> Result<WorkbookLayout, XlsxError> {
    let workbook = office_document_part(package)?;
    let workbook_xml = package.part_str(&workbook)?;
    let doc = roxmltree::Document::parse(workbook_xml)?;

    let rels_name = rels_part_name(&workbook);
    let rels = parse_relationships(package.require_part(&rels_name)?)?;
    let rel_by_id: HashMap<&str, &Relationship> =
        rels.iter().map(|rel| (rel.id.as_str(), rel)).collect();

    let mut sheets = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "sheet")
    {
        let name = node.attribute("name").unwrap_or_default().to_string();
        let rel_id = node
            .attribute((REL_NS, "id"))
            .or_else(|| {
                node.attributes()
                    .find(|a| a.name() == "id")
                    .map(|a| a.value())
            })
            .ok_or_else(|| XlsxError::Invalid(format!("sheet `{name}` has no relationship id")))?;
        let rel = rel_by_id.get(rel_id).ok_or_else(|| {
            XlsxError::Invalid(format!("missing relationship {rel_id} for sheet `{name}`"))
        })?;
        if !rel.has_kind("worksheet") {
            log::debug!("skipping non-worksheet sheet `{name}` ({})", rel.type_uri);
            continue;
        }
        sheets.push(SheetPart {
            name,
            part: resolve_target(&workbook, &rel.target),
        });
    }

    let find = |kind: &str| {
        rels.iter()
            .find(|rel| rel.has_kind(kind) && !rel.is_external())
            .map(|rel| resolve_target(&workbook, &rel.target))
    };
    Ok(WorkbookLayout {
        shared_strings: find("sharedStrings"),
        styles: find("styles"),
        sheets,
        workbook,
    })
}

/// `true` when `[Content_Types].xml` declares the workbook as a template (`.xltx`).
pub(crate) fn is_template(package: &OpcPackage) -> bool {
    package
        .part("[Content_Types].xml")
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .is_some_and(|xml| xml.contains(TEMPLATE_CONTENT_TYPE))
}

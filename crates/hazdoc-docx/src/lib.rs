//! Word template merging.
//!
//! Merge fields are written as `{{ KEY }}` anywhere in the body, tables, headers or footers.
//! Word freely splits typed text into several runs (spell-check marks, revision ids, formatting
//! changes), so fields are matched against the concatenated text of each paragraph rather than
//! inside individual `<w:t>` elements.

use std::collections::BTreeSet;

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use thiserror::Error;

use hazdoc_model::FieldMap;
use hazdoc_opc::path::{rels_part_name, resolve_target};
use hazdoc_opc::{local_name, parse_relationships, OpcError, OpcPackage};

mod paragraph;

use paragraph::{merge_field_re, MergeReport, Paragraph};

#[derive(Debug, Error)]
pub enum DocxError {
    #[error(transparent)]
    Package(#[from] OpcError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("invalid docx: {0}")]
    Invalid(String),
}

/// A loaded `.docx` template.
#[derive(Debug, Clone)]
pub struct DocxTemplate {
    package: OpcPackage,
    main_part: String,
    story_parts: Vec<String>,
}

impl DocxTemplate {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        Self::from_package(OpcPackage::from_bytes(bytes)?)
    }

    pub fn from_package(package: OpcPackage) -> Result<Self, DocxError> {
        let main_part = main_document_part(&package)?;
        package.require_part(&main_part)?;
        let story_parts = story_parts(&package, &main_part)?;
        log::debug!("docx template: {} part(s) to merge", story_parts.len());
        Ok(Self {
            package,
            main_part,
            story_parts,
        })
    }

    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    /// The main document followed by every header and footer part.
    pub fn story_parts(&self) -> &[String] {
        &self.story_parts
    }

    /// Keys of every well-formed merge field in the template.
    pub fn placeholders(&self) -> Result<BTreeSet<String>, DocxError> {
        let mut keys = BTreeSet::new();
        for name in &self.story_parts {
            let Some(xml) = self.package.part(name) else {
                continue;
            };
            walk_paragraphs(xml, |paragraph| {
                let text = paragraph.text();
                keys.extend(
                    merge_field_re()
                        .captures_iter(&text)
                        .filter_map(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string()),
                );
                Ok((paragraph.into_events(), false))
            })?;
        }
        Ok(keys)
    }

    /// Merge `fields` into a copy of the template package.
    ///
    /// Fields without a value render as empty text.
    pub fn fill(&self, fields: &FieldMap) -> Result<OpcPackage, DocxError> {
        let mut package = self.package.clone();
        let mut report = MergeReport::default();

        for name in &self.story_parts {
            let Some(xml) = package.part(name) else {
                continue;
            };
            let merged = walk_paragraphs(xml, |paragraph| paragraph.merge(fields, &mut report))?;
            if let Some(merged) = merged {
                package.set_part(name.clone(), merged);
            }
        }

        log::debug!(
            "merged {} field(s); {} key(s) without value",
            report.replaced,
            report.missing.len()
        );
        Ok(package)
    }
}

fn main_document_part(package: &OpcPackage) -> Result<String, DocxError> {
    if let Some(root_rels) = package.part("_rels/.rels") {
        let rels = parse_relationships(root_rels)?;
        if let Some(rel) = rels.iter().find(|rel| rel.has_kind("officeDocument")) {
            return Ok(resolve_target("", &rel.target));
        }
    }
    Ok("word/document.xml".to_string())
}

/// Main part, then headers and footers from its relationships, then any `header*.xml` /
/// `footer*.xml` next to it that the relationships missed.
fn story_parts(package: &OpcPackage, main_part: &str) -> Result<Vec<String>, DocxError> {
    let mut parts = vec![main_part.to_string()];
    if let Some(rels) = package.part(&rels_part_name(main_part)) {
        for rel in parse_relationships(rels)? {
            if rel.is_external() || !(rel.has_kind("header") || rel.has_kind("footer")) {
                continue;
            }
            let target = resolve_target(main_part, &rel.target);
            if !parts.contains(&target) {
                parts.push(target);
            }
        }
    }

    let dir = main_part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut extra: Vec<String> = package
        .part_names()
        .filter(|name| {
            let Some(file) = name
                .strip_prefix(dir)
                .and_then(|rest| rest.strip_prefix('/').or((dir.is_empty()).then_some(rest)))
            else {
                return false;
            };
            !file.contains('/')
                && (file.starts_with("header") || file.starts_with("footer"))
                && file.ends_with(".xml")
        })
        .filter(|name| !parts.iter().any(|p| p == name))
        .map(str::to_string)
        .collect();
    extra.sort();
    parts.extend(extra);
    Ok(parts)
}

/// Stream one part, handing each complete paragraph to `on_paragraph`.
///
/// The callback returns the paragraph's events and whether they differ from the input. The
/// rewritten part is returned only when some paragraph changed.
fn walk_paragraphs(
    xml: &[u8],
    mut on_paragraph: impl FnMut(Paragraph) -> Result<(Vec<Event<'static>>, bool), DocxError>,
) -> Result<Option<Vec<u8>>, DocxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    let mut open: Vec<Paragraph> = Vec::new();
    let mut changed = false;

    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        let paragraph_tag = match &event {
            Event::Eof => break,
            Event::Start(e) => local_name(e.name().as_ref()) == b"p",
            Event::End(e) => local_name(e.name().as_ref()) == b"p" && !open.is_empty(),
            _ => false,
        };
        match event {
            Event::Start(_) if paragraph_tag => open.push(Paragraph::new(event)),
            Event::End(_) if paragraph_tag => {
                let Some(mut paragraph) = open.pop() else {
                    break;
                };
                paragraph.push(event)?;
                let (events, paragraph_changed) = on_paragraph(paragraph)?;
                changed |= paragraph_changed;
                match open.last_mut() {
                    Some(parent) => parent.push_opaque(events),
                    None => {
                        for event in events {
                            writer.write_event(event)?;
                        }
                    }
                }
            }
            other => match open.last_mut() {
                Some(paragraph) => paragraph.push(other)?,
                None => writer.write_event(other)?,
            },
        }
        buf.clear();
    }

    if !open.is_empty() {
        return Err(DocxError::Invalid("unterminated paragraph".to_string()));
    }
    Ok(changed.then(|| writer.into_inner()))
}

use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use hazdoc_opc::local_name;

use crate::xml::{event_text, prefixed, push_text_element};
use crate::XlsxError;

/// The shared string table of a workbook, plus any strings appended during a fill.
///
/// Only appends are written back; existing `<si>` entries are re-emitted untouched.
#[derive(Debug, Clone)]
pub(crate) struct SharedStrings {
    original: Vec<u8>,
    items: Vec<String>,
    plain_index: HashMap<String, u32>,
    appended: usize,
    released_refs: u64,
}

impl SharedStrings {
    pub(crate) fn parse(xml: &[u8]) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();

        let mut items = Vec::new();
        let mut plain_index = HashMap::new();
        let mut current: Option<(String, bool)> = None;
        let mut in_t = false;
        let mut phonetic_depth = 0usize;

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match &event {
                Event::Start(e) => match local_name(e.name().as_ref()) {
                    b"si" => current = Some((String::new(), false)),
                    b"r" => {
                        if let Some((_, rich)) = current.as_mut() {
                            *rich = true;
                        }
                    }
                    b"rPh" => phonetic_depth += 1,
                    b"t" if phonetic_depth == 0 => in_t = true,
                    _ => {}
                },
                Event::Empty(e) if local_name(e.name().as_ref()) == b"si" => {
                    push_item(&mut items, &mut plain_index, String::new(), false);
                }
                Event::End(e) => match local_name(e.name().as_ref()) {
                    b"si" => {
                        if let Some((text, rich)) = current.take() {
                            push_item(&mut items, &mut plain_index, text, rich);
                        }
                    }
                    b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                    b"t" => in_t = false,
                    _ => {}
                },
                Event::Eof => break,
                other if in_t => {
                    if let (Some((text, _)), Some(chunk)) = (current.as_mut(), event_text(other)?) {
                        text.push_str(&chunk);
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            original: xml.to_vec(),
            items,
            plain_index,
            appended: 0,
            released_refs: 0,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Plain text of item `idx` (rich runs flattened, phonetic hints dropped).
    pub(crate) fn text(&self, idx: usize) -> Option<&str> {
        self.items.get(idx).map(String::as_str)
    }

    /// Index of a plain item with this text, appending one when none exists.
    pub(crate) fn get_or_insert(&mut self, text: &str) -> u32 {
        if let Some(idx) = self.plain_index.get(text) {
            return *idx;
        }
        let idx = self.items.len() as u32;
        self.items.push(text.to_string());
        self.plain_index.insert(text.to_string(), idx);
        self.appended += 1;
        idx
    }

    /// A cell that pointed into the table stopped doing so (it became a number).
    pub(crate) fn release_reference(&mut self) {
        self.released_refs += 1;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.appended > 0 || self.released_refs > 0
    }

    /// Re-emit the original part with the appended items and adjusted counts.
    pub(crate) fn write_if_dirty(&self) -> Result<Option<Vec<u8>>, XlsxError> {
        if !self.is_dirty() {
            return Ok(None);
        }

        let mut reader = Reader::from_reader(self.original.as_slice());
        reader.config_mut().trim_text(false);
        let mut writer = Writer::new(Vec::with_capacity(self.original.len() + self.appended * 64));
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if local_name(e.name().as_ref()) == b"sst" => {
                    writer.write_event(Event::Start(self.patch_counts(&e)?))?;
                }
                Event::Empty(e) if local_name(e.name().as_ref()) == b"sst" => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(self.patch_counts(&e)?))?;
                    self.write_appended(&mut writer, tag.as_bytes())?;
                    writer.write_event(Event::End(BytesEnd::new(tag)))?;
                }
                Event::End(e) if local_name(e.name().as_ref()) == b"sst" => {
                    self.write_appended(&mut writer, e.name().as_ref())?;
                    writer.write_event(Event::End(e.into_owned()))?;
                }
                Event::Eof => break,
                ev => writer.write_event(ev.into_owned())?,
            }
            buf.clear();
        }

        Ok(Some(writer.into_inner()))
    }

    fn patch_counts(&self, e: &BytesStart<'_>) -> Result<BytesStart<'static>, XlsxError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut patched = BytesStart::new(tag);
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            match attr.key.as_ref() {
                b"uniqueCount" => {
                    patched.push_attribute(("uniqueCount", self.items.len().to_string().as_str()));
                }
                b"count" => {
                    // A rewritten string cell swaps one reference for another; only cells
                    // turned numeric drop theirs.
                    let old: u64 = attr.unescape_value()?.trim().parse().unwrap_or(0);
                    let count = old.saturating_sub(self.released_refs);
                    patched.push_attribute(("count", count.to_string().as_str()));
                }
                _ => patched.push_attribute((attr.key.as_ref(), attr.value.as_ref())),
            }
        }
        Ok(patched)
    }

    fn write_appended(&self, writer: &mut Writer<Vec<u8>>, sst_name: &[u8]) -> Result<(), XlsxError> {
        let si = prefixed(sst_name, "si");
        let t = prefixed(sst_name, "t");
        let mut events = Vec::new();
        for text in &self.items[self.items.len() - self.appended..] {
            events.push(Event::Start(BytesStart::new(si.clone())));
            push_text_element(&mut events, &t, text);
            events.push(Event::End(BytesEnd::new(si.clone())));
        }
        for event in events {
            writer.write_event(event)?;
        }
        Ok(())
    }
}

fn push_item(items: &mut Vec<String>, plain_index: &mut HashMap<String, u32>, text: String, rich: bool) {
    let idx = items.len() as u32;
    if !rich {
        plain_index.entry(text.clone()).or_insert(idx);
    }
    items.push(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SST: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3"><si><t>Shipper: {{SHIPPER}}</t></si><si><r><rPr><b/></rPr><t>UN</t></r><r><t xml:space="preserve"> {{UNNO}}</t></r></si><si><t>漢字</t><rPh sb="0" eb="2"><t>かんじ</t></rPh></si></sst>"#;

    #[test]
    fn flattens_rich_text_and_skips_phonetic_runs() {
        let sst = SharedStrings::parse(SST.as_bytes()).unwrap();
        assert_eq!(sst.len(), 3);
        assert_eq!(sst.text(0), Some("Shipper: {{SHIPPER}}"));
        assert_eq!(sst.text(1), Some("UN {{UNNO}}"));
        assert_eq!(sst.text(2), Some("漢字"));
    }

    #[test]
    fn reuses_plain_items_but_not_rich_ones() {
        let mut sst = SharedStrings::parse(SST.as_bytes()).unwrap();
        assert_eq!(sst.get_or_insert("Shipper: {{SHIPPER}}"), 0);
        assert_eq!(sst.get_or_insert("UN {{UNNO}}"), 3);
        assert!(sst.is_dirty());
    }

    #[test]
    fn untouched_table_is_not_rewritten() {
        let sst = SharedStrings::parse(SST.as_bytes()).unwrap();
        assert!(sst.write_if_dirty().unwrap().is_none());
    }

    #[test]
    fn appends_items_and_updates_unique_count() {
        let mut sst = SharedStrings::parse(SST.as_bytes()).unwrap();
        sst.get_or_insert("Shipper: ACME & Sons");
        sst.get_or_insert(" padded");
        let out = String::from_utf8(sst.write_if_dirty().unwrap().unwrap()).unwrap();

        assert!(out.contains(r#"count="3" uniqueCount="5""#), "{out}");
        assert!(out.contains("<si><t>Shipper: {{SHIPPER}}</t></si>"));
        assert!(out.ends_with(
            r#"<si><t>Shipper: ACME &amp; Sons</t></si><si><t xml:space="preserve"> padded</t></si></sst>"#
        ));

        let reparsed = SharedStrings::parse(out.as_bytes()).unwrap();
        assert_eq!(reparsed.text(3), Some("Shipper: ACME & Sons"));
    }

    #[test]
    fn released_references_lower_the_count() {
        let mut sst = SharedStrings::parse(SST.as_bytes()).unwrap();
        sst.release_reference();
        let out = String::from_utf8(sst.write_if_dirty().unwrap().unwrap()).unwrap();
        assert!(out.contains(r#"count="2" uniqueCount="3""#), "{out}");
    }

    #[test]
    fn empty_table_grows_into_a_full_element() {
        let mut sst = SharedStrings::parse(br#"<sst count="0" uniqueCount="0"/>"#).unwrap();
        assert_eq!(sst.get_or_insert("x"), 0);
        let out = String::from_utf8(sst.write_if_dirty().unwrap().unwrap()).unwrap();
        assert_eq!(out, r#"<sst count="0" uniqueCount="1"><si><t>x</t></si></sst>"#);
    }
}

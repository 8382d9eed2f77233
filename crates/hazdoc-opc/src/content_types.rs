use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::local_name;
use crate::package::OpcError;

/// Rewrite `[Content_Types].xml` so the `<Override>` for `part_name` advertises `content_type`.
///
/// An override is appended when none exists. Returns `Ok(None)` when the document already
/// matches, so callers can leave the part byte-identical.
pub fn rewrite_override_content_type(
    content_types_xml: &[u8],
    part_name: &str,
    content_type: &str,
) -> Result<Option<Vec<u8>>, OpcError> {
    let part_name = part_name.trim_start_matches('/');
    let mut reader = Reader::from_reader(content_types_xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(content_types_xml.len() + 128));
    let mut buf = Vec::new();

    let mut found = false;
    let mut changed = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) if is_named(e, b"Override") => {
                let patched = patch_override(e, part_name, content_type, &mut found)?;
                changed |= patched.is_some();
                writer.write_event(Event::Start(patched.unwrap_or_else(|| e.to_owned())))?;
            }
            Event::Empty(ref e) if is_named(e, b"Override") => {
                let patched = patch_override(e, part_name, content_type, &mut found)?;
                changed |= patched.is_some();
                writer.write_event(Event::Empty(patched.unwrap_or_else(|| e.to_owned())))?;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"Types" => {
                if !found {
                    changed = true;
                    writer.write_event(Event::Empty(new_override(part_name, content_type)))?;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Empty(ref e) if is_named(e, b"Types") => {
                if found {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                } else {
                    changed = true;
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e.to_owned()))?;
                    writer.write_event(Event::Empty(new_override(part_name, content_type)))?;
                    writer.write_event(Event::End(BytesEnd::new(tag)))?;
                }
            }
            Event::Eof => break,
            other => writer.write_event(other.into_owned())?,
        }
        buf.clear();
    }

    Ok(changed.then(|| writer.into_inner()))
}

fn is_named(e: &BytesStart<'_>, name: &[u8]) -> bool {
    local_name(e.name().as_ref()) == name
}

fn new_override(part_name: &str, content_type: &str) -> BytesStart<'static> {
    let mut el = BytesStart::new("Override");
    el.push_attribute(("PartName", format!("/{part_name}").as_str()));
    el.push_attribute(("ContentType", content_type));
    el
}

/// Returns the replacement element when `e` is the override for `part_name` and carries a
/// different content type.
fn patch_override(
    e: &BytesStart<'_>,
    part_name: &str,
    content_type: &str,
    found: &mut bool,
) -> Result<Option<BytesStart<'static>>, OpcError> {
    let mut is_target = false;
    let mut existing = None;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        match local_name(attr.key.as_ref()) {
            b"PartName" => {
                let value = attr.unescape_value()?;
                is_target = value.trim_start_matches('/').eq_ignore_ascii_case(part_name);
            }
            b"ContentType" => existing = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }
    if !is_target {
        return Ok(None);
    }
    *found = true;
    if existing.as_deref() == Some(content_type) {
        return Ok(None);
    }

    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut patched = BytesStart::new(tag);
    let mut saw_content_type = false;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()) == b"ContentType" {
            saw_content_type = true;
            patched.push_attribute((attr.key.as_ref(), content_type.as_bytes()));
        } else {
            patched.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    if !saw_content_type {
        patched.push_attribute(("ContentType", content_type));
    }
    Ok(Some(patched))
}

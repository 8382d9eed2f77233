use std::borrow::Cow;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::XlsxError;

/// Qualified name for `local` using the namespace prefix of `sibling` (`x:c` + `v` -> `x:v`).
pub(crate) fn prefixed(sibling: &[u8], local: &str) -> String {
    match sibling.iter().rposition(|b| *b == b':') {
        Some(idx) => format!("{}:{local}", String::from_utf8_lossy(&sibling[..idx])),
        None => local.to_string(),
    }
}

pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace)
        || text.ends_with(char::is_whitespace)
        || text.contains(['\n', '\t'])
}

pub(crate) fn text_event(text: &str) -> Event<'static> {
    Event::Text(BytesText::from_escaped(partial_escape(text).into_owned()))
}

/// `<name>text</name>` with `xml:space="preserve"` when the text needs it.
pub(crate) fn push_text_element(events: &mut Vec<Event<'static>>, name: &str, text: &str) {
    let mut start = BytesStart::new(name.to_string());
    if needs_space_preserve(text) {
        start.push_attribute(("xml:space", "preserve"));
    }
    events.push(Event::Start(start));
    events.push(text_event(text));
    events.push(Event::End(BytesEnd::new(name.to_string())));
}

/// Read events up to and including the end tag that closes an already-consumed start tag.
pub(crate) fn read_element_body(
    reader: &mut Reader<&[u8]>,
    element: &str,
) -> Result<Vec<Event<'static>>, XlsxError> {
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut depth = 0usize;
    loop {
        let event = reader.read_event_into(&mut buf)?.into_owned();
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => {
                out.push(event);
                return Ok(out);
            }
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(XlsxError::Invalid(format!("unterminated <{element}> element")));
            }
            _ => {}
        }
        out.push(event);
        buf.clear();
    }
}

/// Unescaped content of a text event.
pub(crate) fn event_text<'a>(event: &'a Event<'_>) -> Result<Option<Cow<'a, str>>, XlsxError> {
    match event {
        Event::Text(t) => Ok(Some(t.unescape()?)),
        Event::CData(c) => Ok(Some(Cow::Owned(
            String::from_utf8_lossy(c.as_ref()).into_owned(),
        ))),
        _ => Ok(None),
    }
}

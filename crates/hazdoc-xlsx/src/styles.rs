use std::collections::HashMap;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use hazdoc_opc::local_name;

use crate::xml::{prefixed, read_element_body};
use crate::XlsxError;

/// `cellXfs` view of `xl/styles.xml` that can hand out wrap-text variants of a cell format.
#[derive(Debug, Clone)]
pub(crate) struct StyleSheet {
    original: Vec<u8>,
    cell_xfs: Vec<Vec<Event<'static>>>,
    wraps: Vec<bool>,
    appended: Vec<Vec<Event<'static>>>,
    wrap_of: HashMap<u32, u32>,
}

impl StyleSheet {
    pub(crate) fn parse(xml: &[u8]) -> Result<Self, XlsxError> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();
        let mut in_cell_xfs = false;
        let mut cell_xfs = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if local_name(e.name().as_ref()) == b"cellXfs" => in_cell_xfs = true,
                Event::End(e) if local_name(e.name().as_ref()) == b"cellXfs" => in_cell_xfs = false,
                Event::Start(e) if in_cell_xfs && local_name(e.name().as_ref()) == b"xf" => {
                    let mut events = vec![Event::Start(e.into_owned())];
                    events.extend(read_element_body(&mut reader, "xf")?);
                    cell_xfs.push(events);
                }
                Event::Empty(e) if in_cell_xfs && local_name(e.name().as_ref()) == b"xf" => {
                    cell_xfs.push(vec![Event::Empty(e.into_owned())]);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let wraps = cell_xfs
            .iter()
            .map(|xf| xf_wraps(xf))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            original: xml.to_vec(),
            cell_xfs,
            wraps,
            appended: Vec::new(),
            wrap_of: HashMap::new(),
        })
    }

    pub(crate) fn cell_format_count(&self) -> usize {
        self.cell_xfs.len() + self.appended.len()
    }

    /// Index of a cell format identical to `base` but with wrap text on.
    ///
    /// `base` itself is returned when it already wraps; otherwise one clone per base is
    /// appended to `cellXfs`.
    pub(crate) fn wrapped(&mut self, base: u32) -> Result<u32, XlsxError> {
        let idx = base as usize;
        let Some(xf) = self.cell_xfs.get(idx) else {
            return Err(XlsxError::Invalid(format!(
                "cell style {base} is not defined in styles.xml ({} cell formats)",
                self.cell_xfs.len()
            )));
        };
        if self.wraps[idx] {
            return Ok(base);
        }
        if let Some(existing) = self.wrap_of.get(&base) {
            return Ok(*existing);
        }

        let clone = clone_with_wrap(xf)?;
        let new_idx = self.cell_format_count() as u32;
        self.appended.push(clone);
        self.wrap_of.insert(base, new_idx);
        log::debug!("cloned cell format {base} as {new_idx} with wrap text");
        Ok(new_idx)
    }

    pub(crate) fn write_if_dirty(&self) -> Result<Option<Vec<u8>>, XlsxError> {
        if self.appended.is_empty() {
            return Ok(None);
        }

        let mut reader = Reader::from_reader(self.original.as_slice());
        reader.config_mut().trim_text(false);
        let mut writer = Writer::new(Vec::with_capacity(self.original.len() + self.appended.len() * 128));
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let mut patched = BytesStart::new(tag);
                    let mut saw_count = false;
                    for attr in e.attributes().with_checks(false) {
                        let attr = attr?;
                        if attr.key.as_ref() == b"count" {
                            saw_count = true;
                            let count = self.cell_format_count().to_string();
                            patched.push_attribute(("count", count.as_str()));
                        } else {
                            patched.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
                        }
                    }
                    if !saw_count {
                        patched.push_attribute(("count", self.cell_format_count().to_string().as_str()));
                    }
                    writer.write_event(Event::Start(patched))?;
                }
                Event::End(e) if local_name(e.name().as_ref()) == b"cellXfs" => {
                    for xf in &self.appended {
                        for event in xf {
                            writer.write_event(event.clone())?;
                        }
                    }
                    writer.write_event(Event::End(e.into_owned()))?;
                }
                Event::Eof => break,
                ev => writer.write_event(ev.into_owned())?,
            }
            buf.clear();
        }

        Ok(Some(writer.into_inner()))
    }
}

fn is_true(value: &[u8]) -> bool {
    value == b"1" || value.eq_ignore_ascii_case(b"true")
}

fn xf_wraps(xf: &[Event<'static>]) -> Result<bool, XlsxError> {
    for event in xf {
        if let Event::Start(e) | Event::Empty(e) = event {
            if local_name(e.name().as_ref()) != b"alignment" {
                continue;
            }
            for attr in e.attributes().with_checks(false) {
                let attr = attr?;
                if attr.key.as_ref() == b"wrapText" && is_true(attr.value.as_ref()) {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Copy of `xf` with `applyAlignment="1"` and an `<alignment wrapText="1">` child.
fn clone_with_wrap(xf: &[Event<'static>]) -> Result<Vec<Event<'static>>, XlsxError> {
    let Some((first, rest)) = xf.split_first() else {
        return Err(XlsxError::Invalid("empty cell format".to_string()));
    };
    let (Event::Start(xf_start) | Event::Empty(xf_start)) = first else {
        return Err(XlsxError::Invalid("cell format does not start with <xf>".to_string()));
    };

    let xf_name = xf_start.name().as_ref().to_vec();
    let mut start = BytesStart::new(String::from_utf8_lossy(&xf_name).into_owned());
    for attr in xf_start.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() != b"applyAlignment" {
            start.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    start.push_attribute(("applyAlignment", "1"));

    let mut new_alignment = BytesStart::new(prefixed(&xf_name, "alignment"));
    new_alignment.push_attribute(("wrapText", "1"));

    let mut out = vec![Event::Start(start)];
    if rest.is_empty() {
        out.push(Event::Empty(new_alignment));
        out.push(Event::End(BytesEnd::new(
            String::from_utf8_lossy(&xf_name).into_owned(),
        )));
        return Ok(out);
    }

    let mut depth = 0usize;
    let mut has_alignment = false;
    for event in rest {
        let is_direct_child = depth == 0;
        match event {
            Event::Start(e) | Event::Empty(e)
                if is_direct_child && local_name(e.name().as_ref()) == b"alignment" =>
            {
                has_alignment = true;
                let mut alignment =
                    BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    if attr.key.as_ref() != b"wrapText" {
                        alignment.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
                    }
                }
                alignment.push_attribute(("wrapText", "1"));
                out.push(match event {
                    Event::Start(_) => Event::Start(alignment),
                    _ => Event::Empty(alignment),
                });
            }
            other => out.push(other.clone()),
        }
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    // `alignment` is the first child in the `CT_Xf` sequence.
    if !has_alignment {
        out.insert(1, Event::Empty(new_alignment));
    }
    Ok(out)
}

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::OnceLock;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use regex::Regex;

use hazdoc_model::FieldMap;
use hazdoc_opc::local_name;

use crate::DocxError;

pub(crate) fn merge_field_re() -> &'static Regex {
    static MERGE_FIELD_RE: OnceLock<Regex> = OnceLock::new();
    MERGE_FIELD_RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex")
    })
}

/// Counters for one fill, used for logging.
#[derive(Debug, Default)]
pub(crate) struct MergeReport {
    pub(crate) replaced: usize,
    pub(crate) missing: BTreeSet<String>,
}

/// One `<w:t>` element: event indices of its start and end tag plus its unescaped text.
#[derive(Debug)]
struct TextSegment {
    start: usize,
    end: usize,
    text: String,
}

/// The buffered events of a single paragraph.
///
/// Nested paragraphs (text boxes) are merged on their own and pushed in as opaque events, so
/// only this paragraph's own `<w:t>` elements become segments.
#[derive(Debug)]
pub(crate) struct Paragraph {
    events: Vec<Event<'static>>,
    segments: Vec<TextSegment>,
    open: Option<(usize, String)>,
}

impl Paragraph {
    pub(crate) fn new(start: Event<'static>) -> Self {
        Self {
            events: vec![start],
            segments: Vec::new(),
            open: None,
        }
    }

    pub(crate) fn push(&mut self, event: Event<'static>) -> Result<(), DocxError> {
        let idx = self.events.len();
        match &event {
            Event::Start(e) if local_name(e.name().as_ref()) == b"t" => {
                self.open = Some((idx, String::new()));
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"t" => {
                if let Some((start, text)) = self.open.take() {
                    self.segments.push(TextSegment {
                        start,
                        end: idx,
                        text,
                    });
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = self.open.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = self.open.as_mut() {
                    text.push_str(&String::from_utf8_lossy(c.as_ref()));
                }
            }
            _ => {}
        }
        self.events.push(event);
        Ok(())
    }

    /// Append already-merged events (a nested paragraph) without scanning them for text.
    pub(crate) fn push_opaque(&mut self, events: Vec<Event<'static>>) {
        self.events.extend(events);
    }

    pub(crate) fn into_events(self) -> Vec<Event<'static>> {
        self.events
    }

    pub(crate) fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Substitute merge fields, returning the paragraph's events and whether any field matched.
    ///
    /// The value of a field lands in the segment holding its opening braces; the rest of the
    /// field's text is removed from whichever segments it spanned.
    pub(crate) fn merge(
        self,
        fields: &FieldMap,
        report: &mut MergeReport,
    ) -> Result<(Vec<Event<'static>>, bool), DocxError> {
        let full = self.text();
        if !merge_field_re().is_match(&full) {
            return Ok((self.events, false));
        }

        let bounds: Vec<Range<usize>> = {
            let mut offset = 0usize;
            self.segments
                .iter()
                .map(|s| {
                    let range = offset..offset + s.text.len();
                    offset = range.end;
                    range
                })
                .collect()
        };
        let owner = |pos: usize| bounds.iter().position(|r| r.contains(&pos));

        let mut new_texts = vec![String::new(); self.segments.len()];
        let copy = |new_texts: &mut Vec<String>, range: Range<usize>| {
            for (i, bound) in bounds.iter().enumerate() {
                let start = range.start.max(bound.start);
                let end = range.end.min(bound.end);
                if start < end {
                    new_texts[i].push_str(&full[start..end]);
                }
            }
        };

        let mut pos = 0usize;
        for caps in merge_field_re().captures_iter(&full) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            copy(&mut new_texts, pos..whole.start());
            let value = match fields.get(key.as_str()) {
                Some(value) => value.to_string(),
                None => {
                    log::debug!("merge field `{}` has no value; rendering empty", key.as_str());
                    report.missing.insert(key.as_str().to_string());
                    String::new()
                }
            };
            if let Some(i) = owner(whole.start()) {
                new_texts[i].push_str(&value);
            }
            report.replaced += 1;
            pos = whole.end();
        }
        copy(&mut new_texts, pos..full.len());

        let mut out = Vec::with_capacity(self.events.len() + 4);
        let mut segments = self.segments.iter().zip(new_texts).peekable();
        let mut events = self.events.into_iter().enumerate();
        while let Some((idx, event)) = events.next() {
            match segments.peek() {
                Some((segment, _)) if segment.start == idx => {
                    let Some((segment, text)) = segments.next() else {
                        break;
                    };
                    let Event::Start(start) = event else {
                        return Err(DocxError::Invalid("text segment lost its start tag".to_string()));
                    };
                    write_text_runs(&mut out, &start, &text)?;
                    // Skip the original text and end tag.
                    for _ in idx..segment.end {
                        events.next();
                    }
                }
                _ => out.push(event),
            }
        }
        Ok((out, true))
    }
}

fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// `<w:t>` elements for `text`, with `<w:br/>` between lines.
fn write_text_runs(
    out: &mut Vec<Event<'static>>,
    original: &BytesStart<'static>,
    text: &str,
) -> Result<(), DocxError> {
    let name = String::from_utf8_lossy(original.name().as_ref()).into_owned();
    let br = match name.rsplit_once(':') {
        Some((prefix, _)) => format!("{prefix}:br"),
        None => "br".to_string(),
    };

    for (i, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if i > 0 {
            out.push(Event::Empty(BytesStart::new(br.clone())));
        }
        let mut start = BytesStart::new(name.clone());
        let mut has_space_attr = false;
        for attr in original.attributes().with_checks(false) {
            let attr = attr?;
            has_space_attr |= attr.key.as_ref() == b"xml:space";
            start.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
        if !has_space_attr && needs_space_preserve(line) {
            start.push_attribute(("xml:space", "preserve"));
        }
        out.push(Event::Start(start));
        out.push(Event::Text(BytesText::from_escaped(
            partial_escape(line).into_owned(),
        )));
        out.push(Event::End(BytesEnd::new(name.clone())));
    }
    Ok(())
}

use std::sync::OnceLock;

use hazdoc_model::FieldMap;
use regex::Regex;

fn placeholder_re() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid regex"))
}

/// Inner text of every `{{...}}` span in `text`, in order of appearance.
pub fn placeholder_keys(text: &str) -> impl Iterator<Item = &str> {
    placeholder_re()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Result of substituting the placeholders of one cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Substitution {
    pub(crate) text: String,
    /// Keys that were replaced, in order; repeats included.
    pub(crate) keys: Vec<String>,
    /// Set when the whole cell was a single placeholder bound to a number.
    pub(crate) number: Option<f64>,
}

/// Replace every `{{KEY}}` span whose inner text is exactly a key of `fields`.
///
/// Spans naming unknown keys are copied through unchanged. Returns `None` when nothing was
/// replaced.
pub(crate) fn substitute(text: &str, fields: &FieldMap) -> Option<Substitution> {
    let mut out = String::with_capacity(text.len());
    let mut keys = Vec::new();
    let mut last = 0usize;
    let mut number = None;

    for caps in placeholder_re().captures_iter(text) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(value) = fields.get(key.as_str()) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&value.to_string());
        last = whole.end();
        keys.push(key.as_str().to_string());

        if whole.start() == 0 && whole.end() == text.len() {
            number = value.as_number().filter(|n| n.is_finite());
        }
    }

    if keys.is_empty() {
        return None;
    }
    out.push_str(&text[last..]);
    Some(Substitution {
        text: out,
        keys,
        number,
    })
}

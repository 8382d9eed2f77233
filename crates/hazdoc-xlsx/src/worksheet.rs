use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use hazdoc_model::keys::is_address_key;
use hazdoc_model::FieldMap;
use hazdoc_opc::local_name;

use crate::shared_strings::SharedStrings;
use crate::styles::StyleSheet;
use crate::tokens::{substitute, Substitution};
use crate::xml::{event_text, prefixed, push_text_element, read_element_body, text_event};
use crate::XlsxError;

/// Mutable workbook state shared by every worksheet of one fill.
pub(crate) struct FillContext<'a> {
    pub(crate) fields: &'a FieldMap,
    pub(crate) shared_strings: Option<&'a mut SharedStrings>,
    pub(crate) styles: Option<&'a mut StyleSheet>,
    pub(crate) cells_changed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Shared,
    Inline,
    Formula,
}

/// What a `<c>` element holds, as far as placeholder substitution cares.
#[derive(Debug, Default)]
struct CellContent {
    has_formula: bool,
    value: Option<String>,
    inline_text: Option<String>,
}

impl CellContent {
    fn read(children: &[Event<'static>]) -> Result<Self, XlsxError> {
        let mut content = CellContent::default();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        for event in children {
            match event {
                Event::Start(e) => {
                    let name = local_name(e.name().as_ref()).to_vec();
                    match name.as_slice() {
                        b"f" => content.has_formula = true,
                        b"v" if stack.is_empty() => content.value = Some(String::new()),
                        b"is" if stack.is_empty() => content.inline_text = Some(String::new()),
                        _ => {}
                    }
                    stack.push(name);
                }
                Event::Empty(e) if local_name(e.name().as_ref()) == b"f" => {
                    content.has_formula = true;
                }
                Event::End(_) => {
                    stack.pop();
                }
                other => {
                    let Some(text) = event_text(other)? else {
                        continue;
                    };
                    let in_phonetic = stack.iter().any(|name| name == b"rPh");
                    match (stack.first().map(Vec::as_slice), stack.last().map(Vec::as_slice)) {
                        (Some(b"v"), _) => {
                            if let Some(value) = content.value.as_mut() {
                                value.push_str(&text);
                            }
                        }
                        (Some(b"is"), Some(b"t")) if !in_phonetic => {
                            if let Some(inline) = content.inline_text.as_mut() {
                                inline.push_str(&text);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(content)
    }
}

#[derive(Debug, Default)]
struct CellAttrs {
    cell_type: Option<String>,
    style: Option<u32>,
}

impl CellAttrs {
    fn read(start: &BytesStart<'_>) -> Result<Self, XlsxError> {
        let mut attrs = CellAttrs::default();
        for attr in start.attributes().with_checks(false) {
            let attr = attr?;
            match attr.key.as_ref() {
                b"t" => attrs.cell_type = Some(attr.unescape_value()?.into_owned()),
                b"s" => attrs.style = attr.unescape_value()?.trim().parse().ok(),
                _ => {}
            }
        }
        Ok(attrs)
    }
}

/// Text of a string cell and how it is stored. `None` for every other cell.
fn string_cell_text(
    attrs: &CellAttrs,
    content: &CellContent,
    shared_strings: Option<&SharedStrings>,
) -> Result<Option<(StringKind, String)>, XlsxError> {
    if content.has_formula {
        return Ok(None);
    }
    match attrs.cell_type.as_deref() {
        Some("s") => {
            let Some(raw) = content.value.as_deref() else {
                return Ok(None);
            };
            let idx: usize = raw.trim().parse().map_err(|_| {
                XlsxError::Invalid(format!("shared string index `{raw}` is not a number"))
            })?;
            let table = shared_strings.ok_or_else(|| {
                XlsxError::Invalid("cell references a shared string table that does not exist".to_string())
            })?;
            let text = table.text(idx).ok_or_else(|| {
                XlsxError::Invalid(format!(
                    "shared string index {idx} out of range ({} items)",
                    table.len()
                ))
            })?;
            Ok(Some((StringKind::Shared, text.to_string())))
        }
        Some("inlineStr") => Ok(content
            .inline_text
            .clone()
            .map(|text| (StringKind::Inline, text))),
        Some("str") => Ok(content.value.clone().map(|text| (StringKind::Formula, text))),
        _ => Ok(None),
    }
}

/// Substitute placeholders in every string cell of a worksheet.
///
/// Returns `Ok(None)` when no cell changed so the part can stay byte-identical.
pub(crate) fn fill_worksheet(
    xml: &[u8],
    ctx: &mut FillContext<'_>,
) -> Result<Option<Vec<u8>>, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();
    let mut changed = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let start = e.into_owned();
                let children = read_element_body(&mut reader, "c")?;
                match rewrite_cell(&start, &children, ctx)? {
                    Some(events) => {
                        changed += 1;
                        for event in events {
                            writer.write_event(event)?;
                        }
                    }
                    None => {
                        writer.write_event(Event::Start(start))?;
                        for event in children {
                            writer.write_event(event)?;
                        }
                    }
                }
            }
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned())?,
        }
        buf.clear();
    }

    ctx.cells_changed += changed;
    Ok((changed > 0).then(|| writer.into_inner()))
}

fn rewrite_cell(
    start: &BytesStart<'static>,
    children: &[Event<'static>],
    ctx: &mut FillContext<'_>,
) -> Result<Option<Vec<Event<'static>>>, XlsxError> {
    let attrs = CellAttrs::read(start)?;
    let content = CellContent::read(children)?;
    let Some((kind, text)) = string_cell_text(&attrs, &content, ctx.shared_strings.as_deref())?
    else {
        return Ok(None);
    };
    let Some(sub) = substitute(&text, ctx.fields) else {
        return Ok(None);
    };

    // Only address cells change style; every other cell keeps its `s` attribute as written.
    let wrap_style = if sub.keys.iter().any(|key| is_address_key(key)) {
        let styles = ctx
            .styles
            .as_deref_mut()
            .ok_or_else(|| XlsxError::MissingPart("xl/styles.xml".to_string()))?;
        Some(styles.wrapped(attrs.style.unwrap_or(0))?)
    } else {
        None
    };

    let numeric = sub.number.is_some();
    if numeric && kind == StringKind::Shared {
        if let Some(table) = ctx.shared_strings.as_deref_mut() {
            table.release_reference();
        }
    }

    let cell_name = start.name().as_ref().to_vec();
    let mut cell = BytesStart::new(String::from_utf8_lossy(&cell_name).into_owned());
    let mut saw_style = false;
    for attr in start.attributes().with_checks(false) {
        let attr = attr?;
        match attr.key.as_ref() {
            b"s" => {
                saw_style = true;
                match wrap_style {
                    Some(style) => cell.push_attribute(("s", style.to_string().as_str())),
                    None => cell.push_attribute((attr.key.as_ref(), attr.value.as_ref())),
                }
            }
            b"t" if numeric => {}
            _ => cell.push_attribute((attr.key.as_ref(), attr.value.as_ref())),
        }
    }
    if !saw_style {
        if let Some(style) = wrap_style {
            cell.push_attribute(("s", style.to_string().as_str()));
        }
    }

    let mut events = vec![Event::Start(cell)];
    write_cell_value(&mut events, &cell_name, kind, &sub, ctx)?;
    events.push(Event::End(BytesEnd::new(
        String::from_utf8_lossy(&cell_name).into_owned(),
    )));
    Ok(Some(events))
}

fn write_cell_value(
    events: &mut Vec<Event<'static>>,
    cell_name: &[u8],
    kind: StringKind,
    sub: &Substitution,
    ctx: &mut FillContext<'_>,
) -> Result<(), XlsxError> {
    let v = prefixed(cell_name, "v");
    if let Some(number) = sub.number {
        push_value(events, &v, &number.to_string());
        return Ok(());
    }
    match kind {
        StringKind::Shared => {
            let table = ctx.shared_strings.as_deref_mut().ok_or_else(|| {
                XlsxError::Invalid("shared string table disappeared during fill".to_string())
            })?;
            let idx = table.get_or_insert(&sub.text);
            push_value(events, &v, &idx.to_string());
        }
        StringKind::Inline => {
            let is = prefixed(cell_name, "is");
            events.push(Event::Start(BytesStart::new(is.clone())));
            push_text_element(events, &prefixed(cell_name, "t"), &sub.text);
            events.push(Event::End(BytesEnd::new(is)));
        }
        StringKind::Formula => push_value(events, &v, &sub.text),
    }
    Ok(())
}

fn push_value(events: &mut Vec<Event<'static>>, name: &str, text: &str) {
    events.push(Event::Start(BytesStart::new(name.to_string())));
    events.push(text_event(text));
    events.push(Event::End(BytesEnd::new(name.to_string())));
}

/// Text of every string cell in a worksheet, for placeholder inspection.
pub(crate) fn string_cells(
    xml: &[u8],
    shared_strings: Option<&SharedStrings>,
) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"c" => {
                let attrs = CellAttrs::read(&e)?;
                let children = read_element_body(&mut reader, "c")?;
                let content = CellContent::read(&children)?;
                if let Some((_, text)) = string_cell_text(&attrs, &content, shared_strings)? {
                    out.push(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET_HEAD: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">"#;
    const SHEET_TAIL: &str = "</row></sheetData></worksheet>";

    fn sheet(cells: &str) -> String {
        format!("{SHEET_HEAD}{cells}{SHEET_TAIL}")
    }

    fn fields() -> FieldMap {
        let mut fields: FieldMap = [("UNNO", "1789"), ("SHIPPER_ADDRESS", "1 Quay St\nSingapore")]
            .into_iter()
            .collect();
        fields.insert("QUANTITY", 4u32);
        fields
    }

    fn fill(xml: &str, shared: Option<&mut SharedStrings>, styles: Option<&mut StyleSheet>) -> Result<Option<String>, XlsxError> {
        let fields = fields();
        let mut ctx = FillContext {
            fields: &fields,
            shared_strings: shared,
            styles,
            cells_changed: 0,
        };
        Ok(fill_worksheet(xml.as_bytes(), &mut ctx)?.map(|bytes| String::from_utf8(bytes).unwrap()))
    }

    #[test]
    fn inline_string_is_rewritten_in_place() {
        let xml = sheet(r#"<c r="A1" s="2" t="inlineStr"><is><t>UN {{UNNO}}</t></is></c><c r="B1"><v>7</v></c>"#);
        let out = fill(&xml, None, None).unwrap().unwrap();
        assert_eq!(
            out,
            sheet(r#"<c r="A1" s="2" t="inlineStr"><is><t>UN 1789</t></is></c><c r="B1"><v>7</v></c>"#)
        );
    }

    #[test]
    fn formula_cells_are_untouched() {
        let xml = sheet(r#"<c r="A1" t="str"><f>"{{UNNO}}"</f><v>{{UNNO}}</v></c>"#);
        assert_eq!(fill(&xml, None, None).unwrap(), None);
    }

    #[test]
    fn formula_less_str_cell_is_substituted() {
        let xml = sheet(r#"<c r="A1" t="str"><v>{{UNNO}}</v></c>"#);
        let out = fill(&xml, None, None).unwrap().unwrap();
        assert!(out.contains(r#"<c r="A1" t="str"><v>1789</v></c>"#), "{out}");
    }

    #[test]
    fn sole_numeric_placeholder_becomes_a_number_cell() {
        let mut sst = SharedStrings::parse(br#"<sst count="1" uniqueCount="1"><si><t>{{QUANTITY}}</t></si></sst>"#).unwrap();
        let xml = sheet(r#"<c r="A1" s="1" t="s"><v>0</v></c>"#);
        let out = fill(&xml, Some(&mut sst), None).unwrap().unwrap();
        assert!(out.contains(r#"<c r="A1" s="1"><v>4</v></c>"#), "{out}");
        assert!(sst.is_dirty());
    }

    #[test]
    fn address_cell_gets_a_wrapping_style() {
        let mut sst = SharedStrings::parse(br#"<sst count="1" uniqueCount="1"><si><t>{{SHIPPER_ADDRESS}}</t></si></sst>"#).unwrap();
        let mut styles = StyleSheet::parse(br#"<styleSheet><cellXfs count="1"><xf xfId="0"/></cellXfs></styleSheet>"#).unwrap();
        let xml = sheet(r#"<c r="A1" t="s"><v>0</v></c>"#);
        let out = fill(&xml, Some(&mut sst), Some(&mut styles)).unwrap().unwrap();
        assert!(out.contains(r#"<c r="A1" t="s" s="1"><v>1</v></c>"#), "{out}");
        assert_eq!(sst.text(1), Some("1 Quay St\nSingapore"));
    }

    #[test]
    fn unparsable_style_attribute_is_kept() {
        let xml = sheet(r#"<c r="A1" s=" x1" t="inlineStr"><is><t>UN {{UNNO}}</t></is></c>"#);
        let out = fill(&xml, None, None).unwrap().unwrap();
        assert!(out.contains(r#"<c r="A1" s=" x1" t="inlineStr"><is><t>UN 1789</t></is></c>"#), "{out}");
    }

    #[test]
    fn address_without_styles_part_is_an_error() {
        let xml = sheet(r#"<c r="A1" t="inlineStr"><is><t>{{SHIPPER_ADDRESS}}</t></is></c>"#);
        assert!(matches!(fill(&xml, None, None), Err(XlsxError::MissingPart(_))));
    }

    #[test]
    fn string_cells_lists_shared_and_inline_text() {
        let sst = SharedStrings::parse(br#"<sst><si><t>{{A}}</t></si></sst>"#).unwrap();
        let xml = sheet(r#"<c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>{{B}}</t></is></c><c r="C1"><v>3</v></c>"#);
        assert_eq!(string_cells(xml.as_bytes(), Some(&sst)).unwrap(), vec!["{{A}}", "{{B}}"]);
    }
}

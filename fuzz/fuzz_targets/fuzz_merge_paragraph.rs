#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;

use hazdoc_io::{fill_bytes, DocumentFormat};
use hazdoc_model::FieldMap;
use hazdoc_opc::OpcPackage;

const MAX_TEXT_CHARS: usize = 2_048;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let text: String = text.chars().take(MAX_TEXT_CHARS).collect();

    // Split the text across runs at arbitrary points so fields straddle run boundaries.
    let mut runs = String::new();
    for chunk in text.as_bytes().chunks(7) {
        let chunk = String::from_utf8_lossy(chunk);
        runs.push_str(&format!(
            r#"<w:r><w:t xml:space="preserve">{}</w:t></w:r>"#,
            escape(&chunk)
        ));
    }
    let document = format!(
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p>{runs}</w:p></w:body></w:document>"#
    );
    let package = OpcPackage::from_parts(BTreeMap::from([(
        "word/document.xml".to_string(),
        document.into_bytes(),
    )]));
    let Ok(bytes) = package.write_to_bytes() else {
        return;
    };

    let fields: FieldMap = [("A", "x"), ("SHIPPER", "line one\nline two")]
        .into_iter()
        .collect();
    let first = fill_bytes(DocumentFormat::Docx, "fuzz", &bytes, &fields);
    let second = fill_bytes(DocumentFormat::Docx, "fuzz", &bytes, &fields);
    match (first, second) {
        (Ok(first), Ok(second)) => assert_eq!(first, second, "fill is not deterministic"),
        (Err(_), Err(_)) => {}
        _ => panic!("fill outcome is not deterministic"),
    }
});

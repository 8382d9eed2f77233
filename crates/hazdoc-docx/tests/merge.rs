use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use hazdoc_docx::DocxTemplate;
use hazdoc_model::FieldMap;
use hazdoc_opc::OpcPackage;
use pretty_assertions::assert_eq;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn build_docx(parts: &[(&str, String)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for (name, body) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn declaration_docx() -> Vec<u8> {
    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/><Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/></Types>"#;
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;
    let doc_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/" TargetMode="External"/></Relationships>"#;
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body><w:p><w:r><w:t xml:space="preserve">Shipper: </w:t></w:r><w:r><w:t>{{{{ SHI</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>PPER }}}}</w:t></w:r></w:p><w:tbl><w:tr><w:tc><w:p><w:r><w:t>{{{{SHIPPER_ADDRESS}}}}</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>{{{{ VESSEL }}}}</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>{{% if hazardous %}}</w:t></w:r></w:p><w:sectPr><w:headerReference r:id="rId1"/></w:sectPr></w:body></w:document>"#
    );
    let header = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="{W_NS}"><w:p><w:r><w:t>Booking {{{{BOOKING_NO}}}}</w:t></w:r></w:p></w:hdr>"#
    );
    // Not referenced from the document relationships.
    let footer = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:ftr xmlns:w="{W_NS}"><w:p><w:r><w:t>{{{{POL}}}} to {{{{POD}}}}</w:t></w:r></w:p></w:ftr>"#
    );
    build_docx(&[
        ("[Content_Types].xml", content_types.to_string()),
        ("_rels/.rels", root_rels.to_string()),
        ("word/document.xml", document),
        ("word/_rels/document.xml.rels", doc_rels.to_string()),
        ("word/header1.xml", header),
        ("word/footer1.xml", footer),
        ("docProps/app.xml", "<Properties/>".to_string()),
    ])
}

fn fields() -> FieldMap {
    [
        ("SHIPPER", "ACME Chemicals"),
        ("SHIPPER_ADDRESS", "12 Harbour Road\nSingapore 123456"),
        ("BOOKING_NO", "BK-001"),
        ("POL", "SGSIN"),
        ("POD", "NLRTM"),
    ]
    .into_iter()
    .collect()
}

fn part_text(package: &OpcPackage, name: &str) -> String {
    String::from_utf8(package.part(name).unwrap().to_vec()).unwrap()
}

#[test]
fn discovers_body_header_and_footer_parts() -> TestResult {
    let template = DocxTemplate::from_bytes(&declaration_docx())?;
    assert_eq!(template.main_part(), "word/document.xml");
    assert_eq!(
        template.story_parts(),
        &["word/document.xml", "word/header1.xml", "word/footer1.xml"]
    );
    Ok(())
}

#[test]
fn lists_placeholders_from_every_story() -> TestResult {
    let template = DocxTemplate::from_bytes(&declaration_docx())?;
    let expected: BTreeSet<String> = [
        "BOOKING_NO",
        "POD",
        "POL",
        "SHIPPER",
        "SHIPPER_ADDRESS",
        "VESSEL",
    ]
    .into_iter()
    .map(str::to_string)
    .collect();
    assert_eq!(template.placeholders()?, expected);
    Ok(())
}

#[test]
fn fills_body_tables_headers_and_footers() -> TestResult {
    let template = DocxTemplate::from_bytes(&declaration_docx())?;
    let filled = template.fill(&fields())?;

    let document = part_text(&filled, "word/document.xml");
    assert!(document.contains("<w:t>ACME Chemicals</w:t>"), "{document}");
    assert!(
        document.contains("<w:t>12 Harbour Road</w:t><w:br/><w:t>Singapore 123456</w:t>"),
        "{document}"
    );
    // No value for VESSEL.
    assert!(document.contains("<w:t></w:t>"), "{document}");
    assert!(document.contains("{% if hazardous %}"), "{document}");
    assert!(document.contains("<w:i/>"), "{document}");

    assert!(part_text(&filled, "word/header1.xml").contains("Booking BK-001"));
    assert!(part_text(&filled, "word/footer1.xml").contains("SGSIN to NLRTM"));

    let refilled = DocxTemplate::from_package(filled)?;
    assert!(refilled.placeholders()?.is_empty());
    Ok(())
}

#[test]
fn unrelated_parts_are_preserved() -> TestResult {
    let original = OpcPackage::from_bytes(&declaration_docx())?;
    let filled = DocxTemplate::from_package(original.clone())?.fill(&fields())?;
    for name in ["[Content_Types].xml", "_rels/.rels", "docProps/app.xml"] {
        assert_eq!(original.part(name), filled.part(name), "part {name} changed");
    }
    Ok(())
}

#[test]
fn filling_is_deterministic() -> TestResult {
    let template = DocxTemplate::from_bytes(&declaration_docx())?;
    let first = template.fill(&fields())?.write_to_bytes()?;
    let second = template.fill(&fields())?.write_to_bytes()?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn document_without_fields_is_unchanged() -> TestResult {
    let bytes = build_docx(&[(
        "word/document.xml",
        format!(r#"<w:document xmlns:w="{W_NS}"><w:body><w:p><w:r><w:t>Static</w:t></w:r></w:p></w:body></w:document>"#),
    )]);
    let original = OpcPackage::from_bytes(&bytes)?;
    let filled = DocxTemplate::from_package(original.clone())?.fill(&fields())?;
    assert_eq!(original, filled);
    Ok(())
}

#[test]
fn package_without_document_is_rejected() {
    let bytes = build_docx(&[("docProps/app.xml", "<Properties/>".to_string())]);
    assert!(DocxTemplate::from_bytes(&bytes).is_err());
}

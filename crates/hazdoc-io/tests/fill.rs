use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::Path;

use hazdoc_io::{
    fill, fill_bytes, placeholders, write_filled, CatalogError, DocumentFormat, FillError,
    FolderSource, TemplateHandle, TemplateSource, DOCX_MIME_TYPE, XLSX_MIME_TYPE,
};
use hazdoc_model::FieldMap;
use hazdoc_opc::OpcPackage;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use zip::write::FileOptions;
use zip::ZipWriter;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn docx_bytes() -> Vec<u8> {
    let document = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>UN {{ UNNO }} / {{ CLASS }}</w:t></w:r></w:p></w:body></w:document>"#;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", FileOptions::<()>::default())
        .unwrap();
    zip.write_all(document.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn xlsx_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "{{UNNO}}").unwrap();
    sheet.write_string(1, 0, "Class {{CLASS}}").unwrap();
    workbook.save_to_buffer().unwrap()
}

fn fields() -> FieldMap {
    [("UNNO", "1789"), ("CLASS", "8")].into_iter().collect()
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> TemplateHandle {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    TemplateHandle::from_path(path)
}

#[test]
fn fills_docx_template_from_disk() -> TestResult {
    let dir = tempfile::tempdir()?;
    let handle = write(dir.path(), "DG Declaration.docx", &docx_bytes());

    let filled = fill(&handle, &fields())?;
    assert_eq!(filled.file_name, "DG Declaration_filled.docx");
    assert_eq!(filled.mime_type, DOCX_MIME_TYPE);

    let package = OpcPackage::from_bytes(&filled.bytes)?;
    let document = package.part_str("word/document.xml")?;
    assert!(document.contains("UN 1789 / 8"), "{document}");
    Ok(())
}

#[test]
fn fills_xlsx_and_xltx_templates_as_xlsx() -> TestResult {
    let dir = tempfile::tempdir()?;
    for name in ["IMO.xlsx", "IMO Template.xltx"] {
        let handle = write(dir.path(), name, &xlsx_bytes());
        let filled = fill(&handle, &fields())?;
        assert_eq!(filled.file_name, format!("{}_filled.xlsx", handle.display_name));
        assert_eq!(filled.mime_type, XLSX_MIME_TYPE);
        let package = OpcPackage::from_bytes(&filled.bytes)?;
        assert!(package.part_str("xl/sharedStrings.xml")?.contains("Class 8"));
    }
    Ok(())
}

#[test]
fn fill_bytes_names_output_after_display_name() -> TestResult {
    let filled = fill_bytes(DocumentFormat::Docx, "memo", &docx_bytes(), &fields())?;
    assert_eq!(filled.file_name, "memo_filled.docx");
    Ok(())
}

#[test]
fn lists_placeholders() -> TestResult {
    let dir = tempfile::tempdir()?;
    let expected = BTreeSet::from(["CLASS".to_string(), "UNNO".to_string()]);
    let docx = write(dir.path(), "a.docx", &docx_bytes());
    let xlsx = write(dir.path(), "b.xlsx", &xlsx_bytes());
    assert_eq!(placeholders(&docx)?, expected);
    assert_eq!(placeholders(&xlsx)?, expected);
    Ok(())
}

#[test]
fn unknown_extension_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let handle = write(dir.path(), "notes.pdf", b"%PDF-1.7");
    let err = fill(&handle, &fields()).unwrap_err();
    assert!(matches!(err, FillError::UnsupportedFormat { .. }), "{err}");
}

#[test]
fn legacy_binary_xls_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    body.resize(512, 0);
    let handle = write(dir.path(), "legacy.xls", &body);
    let err = fill(&handle, &fields()).unwrap_err();
    assert!(matches!(err, FillError::UnsupportedFormat { .. }), "{err}");
}

#[test]
fn corrupt_or_missing_template_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt = write(dir.path(), "broken.docx", b"not a zip at all");
    let err = fill(&corrupt, &fields()).unwrap_err();
    assert!(matches!(err, FillError::TemplateLoad { .. }), "{err}");

    let missing = TemplateHandle::from_path(dir.path().join("gone.xlsx"));
    let err = fill(&missing, &fields()).unwrap_err();
    assert!(matches!(err, FillError::TemplateLoad { .. }), "{err}");
    assert!(err.to_string().contains("gone.xlsx"), "{err}");
}

#[test]
fn load_error_reports_its_cause_only_through_the_source_chain() {
    let dir = tempfile::tempdir().unwrap();
    let missing = TemplateHandle::from_path(dir.path().join("gone.docx"));
    let err = fill(&missing, &fields()).unwrap_err();

    let cause = std::error::Error::source(&err).expect("load error has a cause").to_string();
    assert!(!err.to_string().contains(&cause), "cause repeated in `{err}`");
}

#[test]
fn write_filled_persists_document() -> TestResult {
    let dir = tempfile::tempdir()?;
    let filled = fill_bytes(DocumentFormat::Xlsx, "IMO", &xlsx_bytes(), &fields())?;
    let path = write_filled(&filled, &dir.path().join("out"))?;
    assert_eq!(path, dir.path().join("out/IMO_filled.xlsx"));
    assert_eq!(std::fs::read(path)?, filled.bytes);
    Ok(())
}

#[test]
fn folder_source_keeps_template_extensions_only() -> TestResult {
    let dir = tempfile::tempdir()?;
    for name in ["A.docx", "B.XLSX", "C.xls", "D.xltx", "readme.txt", "~$A.docx"] {
        std::fs::write(dir.path().join(name), b"")?;
    }
    std::fs::create_dir(dir.path().join("nested.docx"))?;

    let listed = FolderSource::new(dir.path()).list_templates()?;
    assert_eq!(
        listed.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["A", "B", "C", "D"]
    );
    assert_eq!(listed["B"].path, dir.path().join("B.XLSX"));
    Ok(())
}

#[test]
fn folder_source_reports_missing_folder() {
    let dir = tempfile::tempdir().unwrap();
    let err = FolderSource::new(dir.path().join("nope"))
        .list_templates()
        .unwrap_err();
    assert!(matches!(err, CatalogError::MissingFolder(_)), "{err}");
}

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use thiserror::Error;

use crate::zip_util::{read_entry_with_budget, zip_part_names_equivalent, InflateBudget};

/// Maximum allowed inflated bytes for a single part.
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

/// Maximum allowed inflated bytes across every part of a package.
pub const MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

/// Signature of an OLE compound file (legacy `.xls` / `.doc`).
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Size limits enforced by [`OpcPackage::from_bytes_limited`].
#[derive(Debug, Clone, Copy)]
pub struct PackageLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: MAX_PART_BYTES,
            max_total_bytes: MAX_TOTAL_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum OpcError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("missing package part: {0}")]
    MissingPart(String),
    #[error(
        "package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
    #[error("invalid package: {0}")]
    Invalid(String),
}

/// `true` when `bytes` start with the OLE compound file signature.
pub fn is_ole_compound(bytes: &[u8]) -> bool {
    bytes.starts_with(&OLE_MAGIC)
}

/// An inflated OPC package: part name -> raw bytes.
///
/// Part names are kept exactly as the producer stored them. The map is ordered, so writing the
/// same package twice yields the same archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpcPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl OpcPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpcError> {
        Self::from_bytes_limited(bytes, PackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: PackageLimits) -> Result<Self, OpcError> {
        if is_ole_compound(bytes) {
            return Err(OpcError::Invalid(
                "input is an OLE compound file, not a ZIP package".to_string(),
            ));
        }
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))?;

        let mut parts = BTreeMap::new();
        let mut budget = InflateBudget::new(limits.max_total_bytes);
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            let declared_size = file.size();
            let buf = read_entry_with_budget(
                &mut file,
                &name,
                declared_size,
                limits.max_part_bytes,
                &mut budget,
            )?;
            parts.insert(name, buf);
        }
        log::debug!(
            "loaded package: {} parts, {} bytes inflated",
            parts.len(),
            budget.used_bytes()
        );

        Ok(Self { parts })
    }

    pub fn from_parts(parts: BTreeMap<String, Vec<u8>>) -> Self {
        Self { parts }
    }

    fn resolve_name(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.parts.get_key_value(name) {
            return Some(key.as_str());
        }
        if let Some(stripped) = name.strip_prefix('/') {
            if let Some((key, _)) = self.parts.get_key_value(stripped) {
                return Some(key.as_str());
            }
        }

        // Producers occasionally write `\` separators or change ASCII case.
        self.parts
            .keys()
            .find(|key| zip_part_names_equivalent(key.as_str(), name))
            .map(String::as_str)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let key = self.resolve_name(name)?;
        self.parts.get(key).map(Vec::as_slice)
    }

    pub fn require_part(&self, name: &str) -> Result<&[u8], OpcError> {
        self.part(name)
            .ok_or_else(|| OpcError::MissingPart(name.to_string()))
    }

    /// Read a part as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<&str, OpcError> {
        Ok(std::str::from_utf8(self.require_part(name)?)?)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Insert or replace a part. An existing entry under an equivalent name keeps its original
    /// spelling.
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        let key = self
            .resolve_name(&name)
            .map(str::to_string)
            .unwrap_or(name);
        self.parts.insert(key, bytes);
    }

    pub fn remove_part(&mut self, name: &str) -> Option<Vec<u8>> {
        let key = self.resolve_name(name)?.to_string();
        self.parts.remove(&key)
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, OpcError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize every part into a new ZIP archive.
    ///
    /// The archive is assembled in memory and only written to `w` once complete.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), OpcError> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = zip::ZipWriter::new(cursor);
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);

        // `[Content_Types].xml` first, as Office writes it.
        let content_types = self.parts.get_key_value("[Content_Types].xml");
        let rest = self
            .parts
            .iter()
            .filter(|(name, _)| name.as_str() != "[Content_Types].xml");
        for (name, bytes) in content_types.into_iter().chain(rest) {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }

        let cursor = zip.finish()?;
        w.write_all(&cursor.into_inner())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build_package(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn part_lookup_tolerates_leading_slash_and_case() {
        let bytes = build_package(&[("word/document.xml", b"<w:document/>")]);
        let pkg = OpcPackage::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.part("/word/document.xml"), Some(&b"<w:document/>"[..]));
        assert_eq!(pkg.part("Word/Document.xml"), Some(&b"<w:document/>"[..]));
        assert!(pkg.part("word/missing.xml").is_none());
    }

    #[test]
    fn set_part_keeps_existing_spelling() {
        let bytes = build_package(&[("XL/workbook.xml", b"a")]);
        let mut pkg = OpcPackage::from_bytes(&bytes).unwrap();
        pkg.set_part("xl/workbook.xml", b"b".to_vec());
        assert_eq!(pkg.part_names().collect::<Vec<_>>(), vec!["XL/workbook.xml"]);
        assert_eq!(pkg.part("xl/workbook.xml"), Some(&b"b"[..]));
    }

    #[test]
    fn round_trip_preserves_parts() {
        let bytes = build_package(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("docProps/app.xml", b"<Properties/>"),
            ("xl/media/image1.png", &[0x89, b'P', b'N', b'G']),
        ]);
        let pkg = OpcPackage::from_bytes(&bytes).unwrap();
        let written = pkg.write_to_bytes().unwrap();
        let reread = OpcPackage::from_bytes(&written).unwrap();
        assert_eq!(pkg, reread);
    }

    #[test]
    fn writing_twice_is_deterministic() {
        let bytes = build_package(&[("a.xml", b"<a/>"), ("b.xml", b"<b/>")]);
        let pkg = OpcPackage::from_bytes(&bytes).unwrap();
        assert_eq!(pkg.write_to_bytes().unwrap(), pkg.write_to_bytes().unwrap());
    }

    #[test]
    fn rejects_parts_over_the_part_limit() {
        let bytes = build_package(&[("xl/big.xml", &[b'x'; 64])]);
        let limits = PackageLimits {
            max_part_bytes: 16,
            max_total_bytes: 1024,
        };
        match OpcPackage::from_bytes_limited(&bytes, limits) {
            Err(OpcError::PartTooLarge { part, max, .. }) => {
                assert_eq!(part, "xl/big.xml");
                assert_eq!(max, 16);
            }
            other => panic!("expected PartTooLarge error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_packages_over_the_total_limit() {
        let bytes = build_package(&[("xl/a.xml", b"123456"), ("xl/b.xml", b"abcdef")]);
        let limits = PackageLimits {
            max_part_bytes: 10,
            max_total_bytes: 10,
        };
        match OpcPackage::from_bytes_limited(&bytes, limits) {
            Err(OpcError::PackageTooLarge { total, max }) => {
                assert_eq!(max, 10);
                assert!(total > max, "expected reported total ({total}) to exceed max ({max})");
            }
            other => panic!("expected PackageTooLarge error, got {other:?}"),
        }
    }

    #[test]
    fn ole_input_is_invalid() {
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0; 504]);
        assert!(is_ole_compound(&bytes));
        assert!(matches!(
            OpcPackage::from_bytes(&bytes),
            Err(OpcError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_is_a_zip_error() {
        assert!(matches!(
            OpcPackage::from_bytes(b"not a zip"),
            Err(OpcError::Zip(_))
        ));
    }
}

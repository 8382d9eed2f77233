//! Minimal OPC (Open Packaging Convention) support.
//!
//! Both `.docx` and `.xlsx` templates are ZIP archives of XML parts. [`OpcPackage`] inflates
//! every part into memory (under [`PackageLimits`]), lets the format crates swap individual
//! parts, and writes a fresh archive back out. Parts that are never touched round-trip
//! byte-for-byte.

mod content_types;
mod package;
pub mod path;
mod relationships;
mod zip_util;

pub use content_types::rewrite_override_content_type;
pub use package::{
    is_ole_compound, OpcError, OpcPackage, PackageLimits, MAX_PART_BYTES, MAX_TOTAL_BYTES,
};
pub use relationships::{parse_relationships, Relationship};

/// Strip a namespace prefix from a qualified XML name (`w:t` -> `t`).
pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

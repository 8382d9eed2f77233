//! Public fill entry point.
//!
//! [`fill`] takes a [`TemplateHandle`] from the catalog and a [`FieldMap`], picks the format
//! from the file extension and returns the finished document in memory. Nothing is written to
//! disk unless the caller asks for it with [`write_filled`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use hazdoc_docx::{DocxError, DocxTemplate};
use hazdoc_model::FieldMap;
use hazdoc_opc::{is_ole_compound, OpcError, OpcPackage};
use hazdoc_xlsx::{XlsxError, XlsxTemplate};

pub mod catalog;
mod fs;

pub use catalog::{
    CachedCatalog, CatalogError, FolderSource, TemplateHandle, TemplateSource, TEMPLATE_EXTENSIONS,
};

pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Underlying cause of a load or write failure.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Package(#[from] OpcError),
    #[error(transparent)]
    Docx(#[from] DocxError),
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}

#[derive(Debug, Error)]
pub enum FillError {
    #[error("unsupported template `{path}`: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("failed to load template `{path}`")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("failed to write filled document `{path}`")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Template families the fill engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Word document with `{{ KEY }}` merge fields.
    Docx,
    /// Workbook or workbook template (`.xlsx`, `.xltx`, `.xls`) with `{{KEY}}` cell tokens.
    Xlsx,
}

impl DocumentFormat {
    /// Map a lowercase file extension (without the dot) to its format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "docx" => Some(Self::Docx),
            "xlsx" | "xltx" | "xls" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Docx => DOCX_MIME_TYPE,
            Self::Xlsx => XLSX_MIME_TYPE,
        }
    }

    /// Extension of the filled output, including the dot.
    pub fn output_extension(self) -> &'static str {
        match self {
            Self::Docx => ".docx",
            Self::Xlsx => ".xlsx",
        }
    }
}

/// A filled document held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

/// Output file name for a template display name: `<name>_filled.<ext>`.
pub fn output_file_name(display_name: &str, format: DocumentFormat) -> String {
    format!("{display_name}_filled{}", format.output_extension())
}

fn template_format(template: &TemplateHandle) -> Result<DocumentFormat, FillError> {
    let ext = template.extension();
    DocumentFormat::from_extension(&ext).ok_or_else(|| FillError::UnsupportedFormat {
        path: template.path.clone(),
        reason: if ext.is_empty() {
            "no file extension".to_string()
        } else {
            format!("extension `.{ext}` is not a template format")
        },
    })
}

fn read_template(template: &TemplateHandle) -> Result<(DocumentFormat, Vec<u8>), FillError> {
    let format = template_format(template)?;
    let bytes = std::fs::read(&template.path).map_err(|source| FillError::TemplateLoad {
        path: template.path.clone(),
        source: source.into(),
    })?;
    Ok((format, bytes))
}

enum Loaded {
    Docx(DocxTemplate),
    Xlsx(XlsxTemplate),
}

fn load(format: DocumentFormat, path: &Path, bytes: &[u8]) -> Result<Loaded, FillError> {
    if is_ole_compound(bytes) {
        return Err(FillError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: "legacy binary (OLE) documents are not supported".to_string(),
        });
    }
    let load_err = |source: FormatError| FillError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    };
    let package = OpcPackage::from_bytes(bytes).map_err(|err| load_err(err.into()))?;
    match format {
        DocumentFormat::Docx => DocxTemplate::from_package(package)
            .map(Loaded::Docx)
            .map_err(|err| load_err(err.into())),
        DocumentFormat::Xlsx => XlsxTemplate::from_package(package)
            .map(Loaded::Xlsx)
            .map_err(|err| load_err(err.into())),
    }
}

/// Fill the template behind `template` with `fields`.
pub fn fill(template: &TemplateHandle, fields: &FieldMap) -> Result<FilledDocument, FillError> {
    let (format, bytes) = read_template(template)?;
    fill_at(format, &template.path, &template.display_name, &bytes, fields)
}

/// Fill an in-memory template. `display_name` names the output file and any error.
pub fn fill_bytes(
    format: DocumentFormat,
    display_name: &str,
    bytes: &[u8],
    fields: &FieldMap,
) -> Result<FilledDocument, FillError> {
    fill_at(format, Path::new(display_name), display_name, bytes, fields)
}

fn fill_at(
    format: DocumentFormat,
    path: &Path,
    display_name: &str,
    bytes: &[u8],
    fields: &FieldMap,
) -> Result<FilledDocument, FillError> {
    let load_err = |source: FormatError| FillError::TemplateLoad {
        path: path.to_path_buf(),
        source,
    };
    let filled = match load(format, path, bytes)? {
        Loaded::Docx(template) => template.fill(fields).map_err(|err| load_err(err.into()))?,
        Loaded::Xlsx(template) => template.fill(fields).map_err(|err| load_err(err.into()))?,
    };

    let file_name = output_file_name(display_name, format);
    let bytes = filled
        .write_to_bytes()
        .map_err(|source| FillError::OutputWrite {
            path: PathBuf::from(&file_name),
            source: source.into(),
        })?;
    log::info!("filled {} ({} bytes)", file_name, bytes.len());
    Ok(FilledDocument {
        bytes,
        file_name,
        mime_type: format.mime_type(),
    })
}

/// Keys referenced by the template's placeholders.
pub fn placeholders(template: &TemplateHandle) -> Result<BTreeSet<String>, FillError> {
    let (format, bytes) = read_template(template)?;
    let load_err = |source: FormatError| FillError::TemplateLoad {
        path: template.path.clone(),
        source,
    };
    match load(format, &template.path, &bytes)? {
        Loaded::Docx(docx) => docx.placeholders().map_err(|err| load_err(err.into())),
        Loaded::Xlsx(xlsx) => xlsx.placeholders().map_err(|err| load_err(err.into())),
    }
}

/// Write `document` into `dir` under its own file name, atomically. Returns the written path.
pub fn write_filled(document: &FilledDocument, dir: &Path) -> Result<PathBuf, FillError> {
    let dest = dir.join(&document.file_name);
    fs::atomic_write_bytes(&dest, &document.bytes).map_err(|source| FillError::OutputWrite {
        path: dest.clone(),
        source: source.into(),
    })?;
    log::debug!("wrote {}", dest.display());
    Ok(dest)
}

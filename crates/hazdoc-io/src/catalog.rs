//! Template discovery.
//!
//! A [`TemplateSource`] lists the templates it can offer, keyed by display name (the file
//! stem). [`FolderSource`] scans one local directory; [`CachedCatalog`] keeps the listing for a
//! fixed TTL so repeated lookups do not rescan the folder.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use hazdoc_cache::TtlCache;

use crate::DocumentFormat;

/// File extensions offered as templates, compared case-insensitively.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["docx", "xlsx", "xls", "xltx"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("template folder `{0}` does not exist")]
    MissingFolder(PathBuf),
    #[error("failed to list templates in `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A template the catalog knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateHandle {
    pub display_name: String,
    pub path: PathBuf,
}

impl TemplateHandle {
    /// Build a handle for a file on disk; the display name is the file stem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { display_name, path }
    }

    /// Lowercased file extension, empty when there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    pub fn format(&self) -> Option<DocumentFormat> {
        DocumentFormat::from_extension(&self.extension())
    }
}

pub trait TemplateSource {
    fn list_templates(&self) -> Result<BTreeMap<String, TemplateHandle>, CatalogError>;
}

/// Templates stored directly inside one directory (subdirectories are not searched).
#[derive(Debug, Clone)]
pub struct FolderSource {
    dir: PathBuf,
}

impl FolderSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for FolderSource {
    fn list_templates(&self) -> Result<BTreeMap<String, TemplateHandle>, CatalogError> {
        if !self.dir.is_dir() {
            return Err(CatalogError::MissingFolder(self.dir.clone()));
        }
        let io_err = |source| CatalogError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut templates: BTreeMap<String, TemplateHandle> = BTreeMap::new();
        for entry in std::fs::read_dir(&self.dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            let handle = TemplateHandle::from_path(entry.path());
            if !TEMPLATE_EXTENSIONS.contains(&handle.extension().as_str()) {
                continue;
            }
            // Office lock files (`~$name.docx`) are not templates.
            if handle.display_name.starts_with("~$") {
                continue;
            }
            // `read_dir` order is unspecified; keep the lexicographically first path.
            let name = handle.display_name.clone();
            let (kept, ignored) = match templates.remove(&name) {
                Some(previous) if previous.path <= handle.path => (previous, Some(handle)),
                Some(previous) => (handle, Some(previous)),
                None => (handle, None),
            };
            if let Some(ignored) = ignored {
                log::warn!(
                    "template name `{name}` is ambiguous; ignoring {}",
                    ignored.path.display()
                );
            }
            templates.insert(name, kept);
        }
        log::debug!("found {} template(s) in {}", templates.len(), self.dir.display());
        Ok(templates)
    }
}

/// A [`TemplateSource`] whose listing is cached for a fixed TTL.
#[derive(Debug)]
pub struct CachedCatalog<S> {
    source: S,
    cache: TtlCache<(), BTreeMap<String, TemplateHandle>>,
}

impl<S: TemplateSource> CachedCatalog<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlCache::new(NonZeroUsize::MIN, ttl),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn list(&mut self) -> Result<BTreeMap<String, TemplateHandle>, CatalogError> {
        let source = &self.source;
        self.cache
            .get_or_try_insert_with((), || source.list_templates())
    }

    /// Look up a template by display name.
    pub fn get(&mut self, display_name: &str) -> Result<Option<TemplateHandle>, CatalogError> {
        Ok(self.list()?.remove(display_name))
    }

    /// Drop the cached listing and list the source again.
    pub fn refresh(&mut self) -> Result<BTreeMap<String, TemplateHandle>, CatalogError> {
        self.cache.clear();
        self.list()
    }
}

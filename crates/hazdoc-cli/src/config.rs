//! Optional `hazdoc.toml` settings. Command-line flags take precedence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hazdoc_model::DEFAULT_ADDRESS_WIDTH;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "hazdoc.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub templates_dir: PathBuf,
    pub refdata_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub address_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            refdata_dir: PathBuf::from("refdata"),
            output_dir: PathBuf::from("."),
            cache_ttl_secs: 3600,
            address_width: DEFAULT_ADDRESS_WIDTH,
        }
    }
}

impl Config {
    /// Load `explicit`, or `hazdoc.toml` when it exists, or fall back to defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

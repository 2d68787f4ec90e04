//! Resolver configuration
//!
//! Stored as TOML; every field has a default so a missing file or a partial
//! document is usable as-is.

use crate::error::{DepotError, DepotResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for package resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory resolved artifacts are copied into
    pub output_dir: PathBuf,

    /// Directory holding the cache and its index
    pub cache_dir: PathBuf,

    /// Whether to consult and populate the cache at all
    pub use_cache: bool,

    /// Offline mode: never consult the remote repository
    pub offline: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("packages"),
            cache_dir: default_cache_dir(),
            use_cache: true,
            offline: false,
        }
    }
}

/// The default cache location under the platform cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depot")
}

impl ResolverConfig {
    /// Load configuration from a TOML file, using defaults if it is missing
    pub fn load(path: &Path) -> DepotResult<Self> {
        if !path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| DepotError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DepotError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> DepotResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DepotError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| DepotError::io(format!("writing config to {}", path.display()), e))
    }
}

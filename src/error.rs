//! Error types for Depot
//!
//! All modules use `DepotResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Depot operations
pub type DepotResult<T> = Result<T, DepotError>;

/// All errors that can occur in Depot
#[derive(Error, Debug)]
pub enum DepotError {
    // Version errors
    #[error("Invalid semantic version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    // Reference errors
    #[error("Package reference must carry a name or an abbreviation")]
    InvalidReference,

    // Index and metadata errors
    #[error("Package index {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("Metadata file {path} is corrupt: {reason}")]
    SidecarCorrupt { path: PathBuf, reason: String },

    // Resolution errors
    #[error("Downloaded file {file} does not match declared checksum: expected={expected}, actual={actual}")]
    IntegrityMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Cannot resolve {reference} from remote when in offline mode")]
    OfflineMiss { reference: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl DepotError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid-version error
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error invalidates the cache rather than the whole resolution.
    ///
    /// Corrupt index or metadata files mean the cache cannot be consulted, but a
    /// caller that can still reach the remote repository may choose to resolve
    /// without it.
    pub fn is_cache_corruption(&self) -> bool {
        matches!(self, Self::IndexCorrupt { .. } | Self::SidecarCorrupt { .. })
    }
}

//! Depot - Local Package Artifact Cache
//!
//! Resolves logical package references (name or abbreviation plus an
//! optional version constraint) to artifact files, backed by an on-disk
//! cache with a durable, advisory-lock-guarded metadata index that is safe
//! to share between processes.

pub mod cache;
pub mod checksum;
pub mod config;
pub mod error;
pub mod index;
pub mod package;
pub mod resolve;
pub mod version;

pub use cache::PackageCache;
pub use config::ResolverConfig;
pub use error::{DepotError, DepotResult};
pub use index::ArtifactRecord;
pub use package::{PackageKey, PackageReference, VersionConstraint};
pub use resolve::{PackageProvider, Resolver};
pub use version::SemanticVersion;

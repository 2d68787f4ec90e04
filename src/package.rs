//! Package identities and resolution requests
//!
//! A package is addressed by an alternate key: its full `name`, its short
//! `abbrev`, or both. The cache index denormalizes a dual-alias package into
//! one row per alias; lookups match by name first and fall back to the
//! abbreviation.

use crate::error::{DepotError, DepotResult};
use crate::version::SemanticVersion;
use std::fmt;

/// The identity key of a package: name, abbreviation, or both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageKey {
    ByName(String),
    ByAbbrev(String),
    ByBoth { name: String, abbrev: String },
}

impl PackageKey {
    /// Build a key from optional name and abbreviation strings.
    ///
    /// Empty strings count as absent; at least one alias must remain or the
    /// key is rejected with [`DepotError::InvalidReference`].
    pub fn from_parts(name: Option<String>, abbrev: Option<String>) -> DepotResult<Self> {
        let name = name.filter(|s| !s.is_empty());
        let abbrev = abbrev.filter(|s| !s.is_empty());
        match (name, abbrev) {
            (Some(name), Some(abbrev)) => Ok(Self::ByBoth { name, abbrev }),
            (Some(name), None) => Ok(Self::ByName(name)),
            (None, Some(abbrev)) => Ok(Self::ByAbbrev(abbrev)),
            (None, None) => Err(DepotError::InvalidReference),
        }
    }

    /// The full package name, if this key carries one
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::ByName(name) | Self::ByBoth { name, .. } => Some(name),
            Self::ByAbbrev(_) => None,
        }
    }

    /// The package abbreviation, if this key carries one
    pub fn abbrev(&self) -> Option<&str> {
        match self {
            Self::ByAbbrev(abbrev) | Self::ByBoth { abbrev, .. } => Some(abbrev),
            Self::ByName(_) => None,
        }
    }
}

/// A caller's resolution request: an identity key plus at most one version
/// selector.
///
/// The four selectors are consulted in a fixed precedence order (exact
/// `version`, exact `semantic_version`, `semantic_version_min`,
/// `semantic_version_max`), so setting more than one is permitted but only
/// the highest-precedence selector takes effect. Selector strings are parsed
/// when the reference is evaluated, which is where a malformed version
/// surfaces as [`DepotError::InvalidVersion`].
#[derive(Debug, Clone)]
pub struct PackageReference {
    pub key: PackageKey,
    pub version: Option<String>,
    pub semantic_version: Option<String>,
    pub semantic_version_min: Option<String>,
    pub semantic_version_max: Option<String>,
}

impl PackageReference {
    /// Create an unconstrained reference (resolves to the latest version)
    pub fn new(key: PackageKey) -> Self {
        Self {
            key,
            version: None,
            semantic_version: None,
            semantic_version_min: None,
            semantic_version_max: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_semantic_version(mut self, version: impl Into<String>) -> Self {
        self.semantic_version = Some(version.into());
        self
    }

    pub fn with_semantic_version_min(mut self, version: impl Into<String>) -> Self {
        self.semantic_version_min = Some(version.into());
        self
    }

    pub fn with_semantic_version_max(mut self, version: impl Into<String>) -> Self {
        self.semantic_version_max = Some(version.into());
        self
    }

    /// Resolve the selector fields into a single constraint, honouring the
    /// precedence order.
    pub fn constraint(&self) -> DepotResult<VersionConstraint> {
        if let Some(ref version) = self.version {
            return Ok(VersionConstraint::Exact(SemanticVersion::parse(version)?));
        }
        if let Some(ref version) = self.semantic_version {
            return Ok(VersionConstraint::Exact(SemanticVersion::parse(version)?));
        }
        if let Some(ref version) = self.semantic_version_min {
            return Ok(VersionConstraint::AtLeast(SemanticVersion::parse(version)?));
        }
        if let Some(ref version) = self.semantic_version_max {
            return Ok(VersionConstraint::AtMost(SemanticVersion::parse(version)?));
        }
        Ok(VersionConstraint::Latest)
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(name) = self.key.name() {
            fields.push(("name", name));
        }
        if let Some(abbrev) = self.key.abbrev() {
            fields.push(("abbrev", abbrev));
        }
        if let Some(ref version) = self.version {
            fields.push(("version", version.as_str()));
        }
        if let Some(ref version) = self.semantic_version {
            fields.push(("semantic-version", version.as_str()));
        }
        if let Some(ref version) = self.semantic_version_min {
            fields.push(("semantic-version-min", version.as_str()));
        }
        if let Some(ref version) = self.semantic_version_max {
            fields.push(("semantic-version-max", version.as_str()));
        }

        write!(f, "{{")?;
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": \"{}\"", key, value)?;
        }
        write!(f, "}}")
    }
}

/// The effective version constraint of a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Exactly this version
    Exact(SemanticVersion),
    /// The greatest version that is at least this
    AtLeast(SemanticVersion),
    /// The greatest version that is at most this
    AtMost(SemanticVersion),
    /// The greatest version available
    Latest,
}

//! Semantic version parsing and ordering
//!
//! Versions follow `MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]`; omitted
//! minor/patch components default to 0. Ordering compares the numeric
//! components only: pre-release and build labels are parsed and kept for
//! display, but two versions that differ only in their labels compare equal.
//! Callers rely on that equality when matching cached artifacts, so it is
//! part of the contract, not an oversight.

use crate::error::{DepotError, DepotResult};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed semantic version
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre_release: Option<String>,
    build: Option<String>,
}

impl SemanticVersion {
    /// Create a version from its numeric components, without labels
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
            build: None,
        }
    }

    /// Parse a version string.
    ///
    /// The entire input must conform to the grammar; trailing or malformed
    /// segments fail with [`DepotError::InvalidVersion`] rather than
    /// producing a partial parse.
    pub fn parse(input: &str) -> DepotResult<Self> {
        if input.is_empty() {
            return Err(DepotError::invalid_version(input, "empty version string"));
        }

        // Split off the build label first: everything after the first `+`.
        let (rest, build) = match input.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (input, None),
        };

        // Then the pre-release label: everything after the first `-`.
        // Hyphens inside the label belong to the label itself.
        let (numeric, pre_release) = match rest.split_once('-') {
            Some((numeric, pre)) => (numeric, Some(pre)),
            None => (rest, None),
        };

        let mut components = numeric.split('.');
        let major = parse_component(input, components.next(), "major")?;
        let minor = match components.next() {
            Some(c) => parse_numeric(input, c, "minor")?,
            None => 0,
        };
        let patch = match components.next() {
            Some(c) => parse_numeric(input, c, "patch")?,
            None => 0,
        };
        if components.next().is_some() {
            return Err(DepotError::invalid_version(
                input,
                "more than three numeric components",
            ));
        }

        let pre_release = pre_release
            .map(|label| parse_label(input, label, "pre-release"))
            .transpose()?;
        let build = build
            .map(|label| parse_label(input, label, "build"))
            .transpose()?;

        Ok(Self {
            major,
            minor,
            patch,
            pre_release,
            build,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// The pre-release label, if any (e.g. `rc1.2` in `1.0.0-rc1.2`)
    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }

    /// The build label, if any (e.g. `nightly` in `1.0.0+nightly`)
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }
}

fn parse_component(input: &str, component: Option<&str>, position: &str) -> DepotResult<u64> {
    match component {
        Some(c) => parse_numeric(input, c, position),
        None => Err(DepotError::invalid_version(
            input,
            format!("missing {position} component"),
        )),
    }
}

fn parse_numeric(input: &str, component: &str, position: &str) -> DepotResult<u64> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DepotError::invalid_version(
            input,
            format!("{position} component is not a number"),
        ));
    }
    component
        .parse()
        .map_err(|_| DepotError::invalid_version(input, format!("{position} component overflows")))
}

/// Validate a pre-release or build label: one or more dot-separated,
/// non-empty, alphanumeric-or-hyphen identifiers.
fn parse_label(input: &str, label: &str, kind: &str) -> DepotResult<String> {
    for identifier in label.split('.') {
        if identifier.is_empty() {
            return Err(DepotError::invalid_version(
                input,
                format!("empty identifier in {kind} label"),
            ));
        }
        if !identifier
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(DepotError::invalid_version(
                input,
                format!("invalid character in {kind} label"),
            ));
        }
    }
    Ok(label.to_string())
}

impl FromStr for SemanticVersion {
    type Err = DepotError;

    fn from_str(s: &str) -> DepotResult<Self> {
        Self::parse(s)
    }
}

// Equality and ordering deliberately ignore the labels; see the module docs.

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.patch.cmp(&other.patch))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.pre_release {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

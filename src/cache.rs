//! The package cache façade
//!
//! Serves cached artifacts that satisfy a version constraint and commits
//! freshly downloaded ones. All state lives in the cache directory (the
//! index file plus artifact and sidecar files), so any number of processes
//! can share one cache; coordination is purely through advisory file locks.

use crate::checksum;
use crate::error::{DepotError, DepotResult};
use crate::index::{self, ArtifactRecord};
use crate::package::{PackageReference, VersionConstraint};
use crate::version::SemanticVersion;
use fs4::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A package cache rooted at a directory.
///
/// The directory must already exist; creating it is the caller's concern.
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path of a cached artifact satisfying `reference`, if any.
    ///
    /// When `authoritative` metadata from the remote repository is supplied,
    /// the cached artifact must carry exactly that version and its recomputed
    /// checksum must match; a stale or mismatched artifact is treated as a
    /// cache miss (forcing the caller to re-download), never as an error.
    pub fn get(
        &self,
        reference: &PackageReference,
        authoritative: Option<&ArtifactRecord>,
    ) -> DepotResult<Option<PathBuf>> {
        let candidates = index::find_entries(&self.root, &reference.key)?;
        let selected = match self.select(reference, &candidates)? {
            Some(selected) => selected,
            None => return Ok(None),
        };
        let (version, artifact_path) = selected;

        if let Some(info) = authoritative {
            if version != SemanticVersion::parse(&info.version)? {
                debug!(
                    "Cached version {} of {} is not the remote version {}, ignoring cache",
                    version, reference, info.version
                );
                return Ok(None);
            }

            let actual = checksum::sha256_file(&artifact_path)?;
            if actual != info.checksum {
                warn!(
                    "SHA-256 checksum of {} does not match remote server version, cached version will be refreshed",
                    artifact_path.display()
                );
                return Ok(None);
            }
        }

        Ok(Some(artifact_path))
    }

    /// Select the best candidate under the reference's version constraint.
    ///
    /// Exact constraints return the first equal candidate. Ranged and
    /// unconstrained selection keep a running best, starting at the 0.0.0
    /// floor and replaced only on strictly greater versions, so the first
    /// candidate seen wins ties. Candidates whose artifact file has vanished
    /// from the cache directory are unusable and skipped.
    fn select(
        &self,
        reference: &PackageReference,
        candidates: &[ArtifactRecord],
    ) -> DepotResult<Option<(SemanticVersion, PathBuf)>> {
        let constraint = reference.constraint()?;

        let mut best_version = SemanticVersion::new(0, 0, 0);
        let mut best_path = None;

        for candidate in candidates {
            let candidate_version = SemanticVersion::parse(&candidate.version)?;
            let artifact_path = self.root.join(&candidate.path);
            if !artifact_path.exists() {
                warn!(
                    "Index references {} but the file is not in the cache, skipping entry",
                    artifact_path.display()
                );
                continue;
            }

            match constraint {
                VersionConstraint::Exact(ref wanted) => {
                    if candidate_version == *wanted {
                        return Ok(Some((candidate_version, artifact_path)));
                    }
                }
                VersionConstraint::AtLeast(ref min) => {
                    if candidate_version >= *min && candidate_version > best_version {
                        best_version = candidate_version;
                        best_path = Some(artifact_path);
                    }
                }
                VersionConstraint::AtMost(ref max) => {
                    if candidate_version <= *max && candidate_version > best_version {
                        best_version = candidate_version;
                        best_path = Some(artifact_path);
                    }
                }
                VersionConstraint::Latest => {
                    if candidate_version > best_version {
                        best_version = candidate_version;
                        best_path = Some(artifact_path);
                    }
                }
            }
        }

        Ok(best_path.map(|path| (best_version, path)))
    }

    /// Commit a downloaded artifact into the cache.
    ///
    /// The artifact bytes and the sidecar metadata file are written while an
    /// exclusive advisory lock is held on the destination file, so a
    /// concurrent locking reader cannot observe a partial artifact. The index
    /// insert runs strictly after that lock is released: the entry becomes
    /// visible to lookups only once the artifact is fully on disk.
    pub fn put(
        &self,
        reference: &PackageReference,
        record: &ArtifactRecord,
        source: &Path,
    ) -> DepotResult<()> {
        let destination = self.root.join(&record.path);
        {
            let mut destination_file = OpenOptions::new()
                .write(true)
                .create(true)
                .open(&destination)
                .map_err(|e| {
                    DepotError::io(format!("opening {} in cache", destination.display()), e)
                })?;
            destination_file.lock_exclusive().map_err(|e| {
                DepotError::io(format!("locking {} in cache", destination.display()), e)
            })?;

            let mut source_file = File::open(source)
                .map_err(|e| DepotError::io(format!("opening {}", source.display()), e))?;
            let copied = io::copy(&mut source_file, &mut destination_file).map_err(|e| {
                DepotError::io(
                    format!(
                        "copying {} to {}",
                        source.display(),
                        destination.display()
                    ),
                    e,
                )
            })?;
            // replacing a longer artifact must not leave trailing bytes
            destination_file.set_len(copied).map_err(|e| {
                DepotError::io(format!("truncating {}", destination.display()), e)
            })?;

            record.write_sidecar(&self.root)?;
            // dropping the handle releases the artifact lock
        }

        index::add_entry(&self.root, &reference.key, record)?;
        debug!("Cached {} as {}", reference, record.path);
        Ok(())
    }
}

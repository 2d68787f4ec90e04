//! The durable package index
//!
//! A single `packages.json` at the cache root maps package identity keys to
//! the sidecar metadata files of their cached artifacts. The index is the
//! only cross-process shared structure, so every access goes through an
//! advisory file lock: shared for reads, exclusive for the full
//! read-modify-write cycle of an insert. Lock acquisition blocks until the
//! lock is granted; there is no timeout and no cancellation, so a stuck
//! holder stalls every other accessor. No in-memory copy survives a call;
//! the file is re-read on every lookup.
//!
//! A package configured with both a name and an abbreviation is denormalized
//! into two rows, one per alias, each listing the same sidecar paths.

use crate::error::{DepotError, DepotResult};
use crate::package::PackageKey;
use fs4::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// File name of the index at the cache root
pub const INDEX_FILENAME: &str = "packages.json";

/// Suffix appended to an artifact file name to derive its sidecar file name
pub const METADATA_FILE_SUFFIX: &str = ".meta.json";

/// Authoritative description of one cached artifact.
///
/// Serialized verbatim as the sidecar metadata file that sits next to the
/// artifact in the cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Lowercase hex SHA-256 of the artifact bytes
    pub checksum: String,
    /// Semantic version string of the artifact
    pub version: String,
    /// Artifact file name, relative to the cache root
    pub path: String,
}

impl ArtifactRecord {
    pub fn new(
        checksum: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            version: version.into(),
            path: path.into(),
        }
    }

    /// The sidecar file name for this artifact
    pub fn sidecar_name(&self) -> String {
        format!("{}{}", self.path, METADATA_FILE_SUFFIX)
    }

    /// Write this record as the sidecar metadata file under `dir`
    pub fn write_sidecar(&self, dir: &Path) -> DepotResult<PathBuf> {
        let path = dir.join(self.sidecar_name());
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)
            .map_err(|e| DepotError::io(format!("writing metadata file {}", path.display()), e))?;
        Ok(path)
    }

    /// Read a sidecar metadata file back into a record
    pub fn read_sidecar(path: &Path) -> DepotResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DepotError::io(format!("reading metadata file {}", path.display()), e))?;
        serde_json::from_str(&contents).map_err(|e| DepotError::SidecarCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// One row of the index: exactly one alias plus the sidecar paths under it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRow {
    #[serde(flatten)]
    key: RowKey,
    paths: Vec<String>,
}

/// The alias a row is keyed by. A row never carries both forms; a dual-alias
/// package gets two rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum RowKey {
    Name { name: String },
    Abbrev { abbrev: String },
}

impl RowKey {
    fn matches(&self, key: &PackageKey) -> bool {
        match self {
            Self::Name { name } => key.name() == Some(name.as_str()),
            Self::Abbrev { abbrev } => key.abbrev() == Some(abbrev.as_str()),
        }
    }
}

/// The whole index document, rows in insertion order
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    packages: Vec<IndexRow>,
}

impl IndexDocument {
    /// Add `sidecar` under `key`, creating the row if absent and suppressing
    /// duplicate paths. Insertion order is preserved so the serialized file
    /// stays deterministic.
    fn insert(&mut self, key: RowKey, sidecar: &str) {
        if let Some(row) = self.packages.iter_mut().find(|row| row.key == key) {
            if !row.paths.iter().any(|path| path == sidecar) {
                row.paths.push(sidecar.to_string());
            }
        } else {
            self.packages.push(IndexRow {
                key,
                paths: vec![sidecar.to_string()],
            });
        }
    }
}

/// Look up all artifact records cached under `key`.
///
/// Takes a shared lock on the index file for the duration of the read, so
/// concurrent lookups proceed in parallel while writers are excluded. A
/// missing index file is an empty cache, not an error. A listed sidecar that
/// cannot be read or parsed aborts the whole read; callers wanting a softer
/// policy must apply it above this layer.
pub fn find_entries(dir: &Path, key: &PackageKey) -> DepotResult<Vec<ArtifactRecord>> {
    let index_path = dir.join(INDEX_FILENAME);
    if !index_path.exists() {
        return Ok(Vec::new());
    }

    let mut file = File::open(&index_path)
        .map_err(|e| DepotError::io(format!("opening package index {}", index_path.display()), e))?;
    file.lock_shared()
        .map_err(|e| DepotError::io(format!("locking package index {}", index_path.display()), e))?;

    let document = match read_document(&mut file, &index_path)? {
        Some(document) => document,
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in &document.packages {
        if !row.key.matches(key) {
            continue;
        }
        for sidecar in &row.paths {
            records.push(ArtifactRecord::read_sidecar(&dir.join(sidecar))?);
        }
    }

    Ok(records)
    // dropping `file` releases the shared lock
}

/// Record `record`'s sidecar under every alias of `key`.
///
/// Holds an exclusive lock on the index file across the whole
/// read-modify-write: parse the current document, merge, rewrite from offset
/// zero, truncate leftovers. Other processes never observe a half-written
/// index. Malformed existing content is fatal; the index is never silently
/// reset.
pub fn add_entry(dir: &Path, key: &PackageKey, record: &ArtifactRecord) -> DepotResult<()> {
    let index_path = dir.join(INDEX_FILENAME);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&index_path)
        .map_err(|e| DepotError::io(format!("opening package index {}", index_path.display()), e))?;
    file.lock_exclusive()
        .map_err(|e| DepotError::io(format!("locking package index {}", index_path.display()), e))?;

    let mut document = read_document(&mut file, &index_path)?.unwrap_or_default();

    let sidecar = record.sidecar_name();
    if let Some(name) = key.name() {
        document.insert(
            RowKey::Name {
                name: name.to_string(),
            },
            &sidecar,
        );
    }
    if let Some(abbrev) = key.abbrev() {
        document.insert(
            RowKey::Abbrev {
                abbrev: abbrev.to_string(),
            },
            &sidecar,
        );
    }

    let serialized = serde_json::to_string_pretty(&document)?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| DepotError::io(format!("rewinding package index {}", index_path.display()), e))?;
    file.write_all(serialized.as_bytes())
        .map_err(|e| DepotError::io(format!("writing package index {}", index_path.display()), e))?;
    // truncate whatever the previous, possibly longer, contents left behind
    file.set_len(serialized.len() as u64)
        .map_err(|e| DepotError::io(format!("truncating package index {}", index_path.display()), e))?;

    Ok(())
    // dropping `file` releases the exclusive lock
}

/// Read and parse the index document from an already-locked file handle.
/// `None` means the file is new or empty.
fn read_document(file: &mut File, index_path: &Path) -> DepotResult<Option<IndexDocument>> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| DepotError::io(format!("reading package index {}", index_path.display()), e))?;

    if contents.trim().is_empty() {
        return Ok(None);
    }

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| DepotError::IndexCorrupt {
            path: index_path.to_path_buf(),
            reason: e.to_string(),
        })
}

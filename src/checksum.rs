//! File checksum computation for cache validation
//!
//! Artifacts are validated by their SHA-256 digest, both when freshly
//! downloaded (against the checksum declared by the repository) and when
//! served from the cache (to detect corruption or tampering).

use crate::error::{DepotError, DepotResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read block size; keeps memory use flat regardless of artifact size
const BLOCK_SIZE: usize = 8192;

/// Compute the SHA-256 digest of a file as 64 lowercase hex characters
pub fn sha256_file(path: &Path) -> DepotResult<String> {
    let file = File::open(path)
        .map_err(|e| DepotError::io(format!("opening {} for hashing", path.display()), e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut block = [0u8; BLOCK_SIZE];

    loop {
        let read = reader
            .read(&mut block)
            .map_err(|e| DepotError::io(format!("reading {} for hashing", path.display()), e))?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

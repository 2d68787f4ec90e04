//! Package resolution
//!
//! Drives one resolution attempt end to end: consult the cache, fall back to
//! the remote repository, validate the download, place the artifact in the
//! output directory and record it in the cache for next time. Remote access
//! goes through the [`PackageProvider`] trait; this crate ships no network
//! client.

use crate::cache::PackageCache;
use crate::checksum;
use crate::config::ResolverConfig;
use crate::error::{DepotError, DepotResult};
use crate::index::ArtifactRecord;
use crate::package::PackageReference;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The remote side of a resolution, implemented by callers.
///
/// `package_info` answers with the authoritative metadata for the best match
/// the repository has for a reference; `fetch` downloads that artifact and
/// returns the path of a temporary local copy, which the resolver validates
/// and then moves into place.
pub trait PackageProvider {
    fn package_info(&self, reference: &PackageReference) -> DepotResult<ArtifactRecord>;

    fn fetch(&self, info: &ArtifactRecord) -> DepotResult<PathBuf>;
}

impl<P: PackageProvider + ?Sized> PackageProvider for &P {
    fn package_info(&self, reference: &PackageReference) -> DepotResult<ArtifactRecord> {
        (**self).package_info(reference)
    }

    fn fetch(&self, info: &ArtifactRecord) -> DepotResult<PathBuf> {
        (**self).fetch(info)
    }
}

/// Resolves package references to artifact files in the output directory
pub struct Resolver<P> {
    config: ResolverConfig,
    provider: P,
    cache: Option<PackageCache>,
}

impl<P: PackageProvider> Resolver<P> {
    /// Create a resolver, creating the cache directory if caching is enabled
    pub fn new(config: ResolverConfig, provider: P) -> DepotResult<Self> {
        let cache = if config.use_cache {
            debug!("Cache is: {}", config.cache_dir.display());
            fs::create_dir_all(&config.cache_dir).map_err(|e| {
                DepotError::io(
                    format!("creating cache directory {}", config.cache_dir.display()),
                    e,
                )
            })?;
            Some(PackageCache::new(&config.cache_dir))
        } else {
            None
        };

        Ok(Self {
            config,
            provider,
            cache,
        })
    }

    /// Resolve one reference to an artifact file in the output directory.
    ///
    /// The cache is consulted first; on a miss the provider downloads the
    /// artifact, which must match its declared checksum before it is moved
    /// into the output directory and cached. A miss in offline mode fails
    /// with [`DepotError::OfflineMiss`].
    pub fn resolve(&self, reference: &PackageReference) -> DepotResult<PathBuf> {
        info!("Attempting to resolve package: {}", reference);

        let authoritative = if self.config.offline {
            None
        } else {
            Some(self.provider.package_info(reference)?)
        };

        if let Some(ref cache) = self.cache {
            if let Some(cached) = cache.get(reference, authoritative.as_ref())? {
                let destination = self.copy_into_output(&cached)?;
                if authoritative.is_none() {
                    warn!(
                        "Operating in offline mode, package version could not be checked with the remote repository"
                    );
                }
                info!("Resolved package from cache: {}", destination.display());
                return Ok(destination);
            }
        }

        let info = match authoritative {
            Some(info) => info,
            None => {
                return Err(DepotError::OfflineMiss {
                    reference: reference.to_string(),
                })
            }
        };

        let downloaded = self.provider.fetch(&info)?;

        // a fresh download failing its declared checksum is fatal, unlike a
        // cached artifact, which merely gets refreshed
        let actual = checksum::sha256_file(&downloaded)?;
        if actual != info.checksum {
            return Err(DepotError::IntegrityMismatch {
                file: info.path.clone(),
                expected: info.checksum.clone(),
                actual,
            });
        }

        self.ensure_output_dir()?;
        let destination = self.config.output_dir.join(&info.path);
        move_file(&downloaded, &destination)?;
        info!("Resolved package from server: {}", destination.display());

        if let Some(ref cache) = self.cache {
            cache.put(reference, &info, &destination)?;
        }

        Ok(destination)
    }

    fn ensure_output_dir(&self) -> DepotResult<()> {
        fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            DepotError::io(
                format!(
                    "creating output directory {}",
                    self.config.output_dir.display()
                ),
                e,
            )
        })
    }

    fn copy_into_output(&self, cached: &Path) -> DepotResult<PathBuf> {
        self.ensure_output_dir()?;
        let file_name = cached.file_name().ok_or_else(|| {
            DepotError::io(
                format!("cached artifact {} has no file name", cached.display()),
                io::Error::from(io::ErrorKind::InvalidInput),
            )
        })?;
        let destination = self.config.output_dir.join(file_name);
        fs::copy(cached, &destination).map_err(|e| {
            DepotError::io(
                format!(
                    "copying {} to {}",
                    cached.display(),
                    destination.display()
                ),
                e,
            )
        })?;
        Ok(destination)
    }
}

/// Move a file, falling back to copy-and-delete when a rename is not
/// possible (the download may live on a different filesystem).
fn move_file(source: &Path, target: &Path) -> DepotResult<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }

    info!(
        "Atomic move from {} to {} failed, retrying with copy",
        source.display(),
        target.display()
    );
    fs::copy(source, target).map_err(|e| {
        DepotError::io(
            format!("copying {} to {}", source.display(), target.display()),
            e,
        )
    })?;
    fs::remove_file(source)
        .map_err(|e| DepotError::io(format!("removing {}", source.display()), e))
}

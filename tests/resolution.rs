//! End-to-end resolution tests against a stub package provider

use depot::{
    ArtifactRecord, DepotError, DepotResult, PackageKey, PackageProvider, PackageReference,
    Resolver, ResolverConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// A remote repository stub serving a single package version from a staging
/// directory, counting how often it is asked.
struct StubProvider {
    record: ArtifactRecord,
    payload: Vec<u8>,
    staging: TempDir,
    info_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl StubProvider {
    fn new(name: &str, version: &str, payload: &[u8]) -> Self {
        let staging = TempDir::new().unwrap();
        let checksum_probe = staging.path().join("probe");
        fs::write(&checksum_probe, payload).unwrap();
        let record = ArtifactRecord::new(
            depot::checksum::sha256_file(&checksum_probe).unwrap(),
            version,
            format!("{name}-{version}.xar"),
        );
        Self {
            record,
            payload: payload.to_vec(),
            staging,
            info_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// A stub whose declared checksum never matches what it serves
    fn lying(name: &str, version: &str, payload: &[u8]) -> Self {
        let mut stub = Self::new(name, version, payload);
        stub.record.checksum = "deadbeef".repeat(8);
        stub
    }

    fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl PackageProvider for StubProvider {
    fn package_info(&self, _reference: &PackageReference) -> DepotResult<ArtifactRecord> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record.clone())
    }

    fn fetch(&self, info: &ArtifactRecord) -> DepotResult<PathBuf> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let download = self.staging.path().join(format!("{}.tmp", info.path));
        fs::write(&download, &self.payload).unwrap();
        Ok(download)
    }
}

fn config(root: &Path) -> ResolverConfig {
    let mut config = ResolverConfig::default();
    config.output_dir = root.join("packages");
    config.cache_dir = root.join("cache");
    config
}

fn reference(name: &str) -> PackageReference {
    PackageReference::new(PackageKey::ByName(name.to_string()))
}

#[test]
fn resolves_from_provider_into_output() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"functx artifact bytes");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();

    let resolved = resolver.resolve(&reference("functx")).unwrap();

    assert_eq!(resolved, root.path().join("packages/functx-1.0.1.xar"));
    assert_eq!(fs::read(&resolved).unwrap(), b"functx artifact bytes");
    assert_eq!(provider.fetch_calls(), 1);
    // the artifact, its sidecar, and the index all landed in the cache
    assert!(root.path().join("cache/functx-1.0.1.xar").exists());
    assert!(root.path().join("cache/functx-1.0.1.xar.meta.json").exists());
    assert!(root.path().join("cache/packages.json").exists());
}

#[test]
fn second_resolution_is_served_from_cache() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"functx artifact bytes");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();

    resolver.resolve(&reference("functx")).unwrap();
    let resolved = resolver.resolve(&reference("functx")).unwrap();

    assert_eq!(fs::read(&resolved).unwrap(), b"functx artifact bytes");
    // the remote was still consulted for metadata, but nothing was downloaded
    assert_eq!(provider.info_calls(), 2);
    assert_eq!(provider.fetch_calls(), 1);
}

#[test]
fn offline_miss_is_fatal() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"bytes");
    let mut config = config(root.path());
    config.offline = true;
    let resolver = Resolver::new(config, &provider).unwrap();

    let result = resolver.resolve(&reference("functx"));

    assert!(matches!(result, Err(DepotError::OfflineMiss { .. })));
    assert_eq!(provider.info_calls(), 0);
}

#[test]
fn offline_serves_cached_artifact_unchecked() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"functx artifact bytes");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();
    resolver.resolve(&reference("functx")).unwrap();

    let offline_provider = StubProvider::new("functx", "1.0.1", b"functx artifact bytes");
    let mut offline_config = config(root.path());
    offline_config.offline = true;
    let offline_resolver = Resolver::new(offline_config, &offline_provider).unwrap();

    let resolved = offline_resolver.resolve(&reference("functx")).unwrap();

    assert_eq!(fs::read(&resolved).unwrap(), b"functx artifact bytes");
    assert_eq!(offline_provider.info_calls(), 0);
    assert_eq!(offline_provider.fetch_calls(), 0);
}

#[test]
fn mismatched_download_checksum_is_fatal() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::lying("functx", "1.0.1", b"not what was promised");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();

    let result = resolver.resolve(&reference("functx"));

    assert!(matches!(result, Err(DepotError::IntegrityMismatch { .. })));
    // the rejected download was never moved into the output directory
    assert!(!root.path().join("packages").exists());
    // and never cached
    assert!(!root.path().join("cache/packages.json").exists());
}

#[test]
fn stale_cache_is_refreshed_from_remote() {
    let root = TempDir::new().unwrap();
    let old_provider = StubProvider::new("functx", "1.0.0", b"old release");
    let resolver = Resolver::new(config(root.path()), &old_provider).unwrap();
    resolver.resolve(&reference("functx")).unwrap();

    let new_provider = StubProvider::new("functx", "2.0.0", b"new release");
    let resolver = Resolver::new(config(root.path()), &new_provider).unwrap();
    let resolved = resolver.resolve(&reference("functx")).unwrap();

    // the cached 1.0.0 no longer matched the remote version, so it was refreshed
    assert_eq!(new_provider.fetch_calls(), 1);
    assert_eq!(fs::read(&resolved).unwrap(), b"new release");

    // both versions now live in the cache; constrain below 2.0.0 to get the old one
    let mut offline_config = config(root.path());
    offline_config.offline = true;
    let offline_resolver = Resolver::new(offline_config, &new_provider).unwrap();
    let old = offline_resolver
        .resolve(&reference("functx").with_semantic_version_max("1.5.0"))
        .unwrap();
    assert_eq!(fs::read(&old).unwrap(), b"old release");
}

#[test]
fn tampered_cached_artifact_is_refreshed() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"genuine bytes");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();
    resolver.resolve(&reference("functx")).unwrap();

    // corrupt the cached copy behind the resolver's back
    fs::write(root.path().join("cache/functx-1.0.1.xar"), b"tampered").unwrap();

    let resolved = resolver.resolve(&reference("functx")).unwrap();

    // checksum validation spotted the corruption and re-downloaded
    assert_eq!(provider.fetch_calls(), 2);
    assert_eq!(fs::read(&resolved).unwrap(), b"genuine bytes");
    assert_eq!(
        fs::read(root.path().join("cache/functx-1.0.1.xar")).unwrap(),
        b"genuine bytes"
    );
}

#[test]
fn disabled_cache_always_fetches() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"bytes");
    let mut config = config(root.path());
    config.use_cache = false;
    let resolver = Resolver::new(config, &provider).unwrap();

    resolver.resolve(&reference("functx")).unwrap();
    resolver.resolve(&reference("functx")).unwrap();

    assert_eq!(provider.fetch_calls(), 2);
    assert!(!root.path().join("cache").exists());
}

#[test]
fn dual_alias_package_is_found_under_either_alias() {
    let root = TempDir::new().unwrap();
    let provider = StubProvider::new("functx", "1.0.1", b"functx artifact bytes");
    let resolver = Resolver::new(config(root.path()), &provider).unwrap();

    let key = PackageKey::from_parts(Some("functx".to_string()), Some("fx".to_string())).unwrap();
    resolver.resolve(&PackageReference::new(key)).unwrap();

    // later, offline, the abbreviation alone finds the cached artifact
    let mut offline_config = config(root.path());
    offline_config.offline = true;
    let offline_resolver = Resolver::new(offline_config, &provider).unwrap();
    let resolved = offline_resolver
        .resolve(&PackageReference::new(PackageKey::ByAbbrev(
            "fx".to_string(),
        )))
        .unwrap();
    assert_eq!(fs::read(&resolved).unwrap(), b"functx artifact bytes");
}

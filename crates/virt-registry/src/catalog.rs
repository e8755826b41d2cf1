//! Host package catalogs and bundle manifests.
//!
//! `install_from_host` consults a [`HostCatalog`] for packages already
//! present on the underlying platform; `install_from_bundle` reads an
//! installable bundle's `manifest.json`.

use crate::types::PackageManifest;
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What packages exist on the underlying platform.
pub trait HostCatalog: Send + Sync {
    fn query(&self, package: &str) -> Option<PackageManifest>;
    fn list(&self) -> Vec<PackageManifest>;
}

/// In-memory catalog for tests and embedding hosts.
#[derive(Default)]
pub struct MemoryCatalog {
    packages: HashMap<String, PackageManifest>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, manifest: PackageManifest) {
        self.packages.insert(manifest.package.clone(), manifest);
    }

    pub fn with_packages(manifests: impl IntoIterator<Item = PackageManifest>) -> Self {
        let mut catalog = Self::new();
        for manifest in manifests {
            catalog.insert(manifest);
        }
        catalog
    }
}

impl HostCatalog for MemoryCatalog {
    fn query(&self, package: &str) -> Option<PackageManifest> {
        self.packages.get(package).cloned()
    }

    fn list(&self) -> Vec<PackageManifest> {
        self.packages.values().cloned().collect()
    }
}

/// Catalog backed by a directory of `*.json` manifests, re-read per query
/// so the host view is never stale.
pub struct DirCatalog {
    dir: PathBuf,
}

impl DirCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl HostCatalog for DirCatalog {
    fn query(&self, package: &str) -> Option<PackageManifest> {
        self.list().into_iter().find(|m| m.package == package)
    }

    fn list(&self) -> Vec<PackageManifest> {
        load_manifest_dir(&self.dir).unwrap_or_default()
    }
}

pub fn load_manifest_file(path: impl AsRef<Path>) -> anyhow::Result<PackageManifest> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading manifest: {}", path.display()))?;
    let manifest: PackageManifest =
        serde_json::from_str(&raw).with_context(|| format!("parsing manifest: {}", path.display()))?;
    if manifest.package.trim().is_empty() {
        anyhow::bail!("manifest has an empty package id: {}", path.display());
    }
    Ok(manifest)
}

pub fn load_manifest_dir(dir: impl AsRef<Path>) -> anyhow::Result<Vec<PackageManifest>> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "json" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    let mut manifests = Vec::with_capacity(entries.len());
    for path in entries {
        manifests.push(load_manifest_file(&path)?);
    }
    Ok(manifests)
}

/// Read the manifest out of an installable bundle: a directory containing
/// `manifest.json`, or a bare manifest file.
pub fn load_bundle_manifest(path: impl AsRef<Path>) -> anyhow::Result<PackageManifest> {
    let path = path.as_ref();
    if path.is_dir() {
        load_manifest_file(path.join("manifest.json"))
    } else {
        load_manifest_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, name: &str, package: &str) {
        let manifest = PackageManifest {
            package: package.to_string(),
            label: Some(package.to_string()),
            version_name: Some("1.0".to_string()),
            target_platform: Some(34),
            capabilities: vec!["camera".to_string()],
        };
        fs::write(
            dir.join(name),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn memory_catalog_round_trips() {
        let catalog =
            MemoryCatalog::with_packages([PackageManifest::bare("com.example.app")]);
        assert!(catalog.query("com.example.app").is_some());
        assert!(catalog.query("com.example.other").is_none());
        assert_eq!(catalog.list().len(), 1);
    }

    #[test]
    fn dir_catalog_loads_sorted_manifests() {
        let tmp = tempfile::tempdir().unwrap();
        write_manifest(tmp.path(), "b.json", "com.example.b");
        write_manifest(tmp.path(), "a.json", "com.example.a");
        fs::write(tmp.path().join("ignored.txt"), b"x").unwrap();

        let catalog = DirCatalog::new(tmp.path());
        let listed = catalog.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].package, "com.example.a");
        assert!(catalog.query("com.example.b").is_some());
    }

    #[test]
    fn bundle_manifest_from_directory_or_file() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = tmp.path().join("app.bundle");
        fs::create_dir_all(&bundle).unwrap();
        write_manifest(&bundle, "manifest.json", "com.example.bundled");

        let from_dir = load_bundle_manifest(&bundle).unwrap();
        assert_eq!(from_dir.package, "com.example.bundled");

        let from_file = load_bundle_manifest(bundle.join("manifest.json")).unwrap();
        assert_eq!(from_file, from_dir);
    }

    #[test]
    fn malformed_bundle_manifest_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(load_bundle_manifest(&path).is_err());
        assert!(load_bundle_manifest(tmp.path().join("missing.json")).is_err());

        fs::write(&path, br#"{"package": "  "}"#).unwrap();
        assert!(load_bundle_manifest(&path).is_err());
    }
}

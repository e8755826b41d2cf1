use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// The permanent default user space; it can never be deleted.
pub const DEFAULT_USER_ID: u32 = 0;

/// Manifest describing an installable package: identity plus the declared
/// capabilities and target platform level a bundle's `manifest.json`
/// carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageManifest {
    pub package: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub version_name: Option<String>,
    #[serde(default)]
    pub target_platform: Option<u32>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl PackageManifest {
    /// Minimal metadata for a package the host knows nothing about
    /// (forced installs).
    pub fn bare(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            label: None,
            version_name: None,
            target_platform: None,
            capabilities: Vec::new(),
        }
    }
}

/// Resolved view of an installed package for one user space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMeta {
    pub manifest: PackageManifest,
    pub installed_users: BTreeSet<u32>,
    pub data_root: PathBuf,
}

impl PackageMeta {
    pub fn package(&self) -> &str {
        &self.manifest.package
    }
}

use crate::catalog::{self, HostCatalog};
use crate::launch::LaunchDescriptor;
use crate::storage;
use crate::types::{PackageManifest, PackageMeta, DEFAULT_USER_ID};
use crate::Error;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

struct PackageRecord {
    manifest: PackageManifest,
    users: BTreeSet<u32>,
}

#[derive(Default)]
struct Inner {
    initialized: bool,
    packages: HashMap<String, PackageRecord>,
    spaces: HashMap<u32, BTreeSet<String>>,
}

/// Registry of (package identity, isolated user space) memberships and
/// their private storage.
///
/// Mutating operations return `false` on failure and log the cause;
/// lookups return `Option`. Every mutation writes or erases on-disk
/// storage under the deterministic layout in [`crate::storage`].
pub struct VirtualEnv {
    root: PathBuf,
    host: Arc<dyn HostCatalog>,
    inner: Mutex<Inner>,
}

impl VirtualEnv {
    pub fn new(root: impl Into<PathBuf>, host: Arc<dyn HostCatalog>) -> Self {
        Self {
            root: root.into(),
            host,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root and default user space, then resume
    /// membership state from what is already on disk. Idempotent.
    pub fn initialize(&self) -> bool {
        let mut inner = self.lock();
        if inner.initialized {
            return true;
        }
        if let Err(e) = fs::create_dir_all(storage::data_root(&self.root)) {
            error!("initializing storage root failed: {e}");
            return false;
        }
        inner.spaces.entry(DEFAULT_USER_ID).or_default();
        self.resume_from_disk(&mut inner);
        inner.initialized = true;
        info!(root = %self.root.display(), "virtual environment initialized");
        true
    }

    /// Rebuild membership from the data tree and manifests from the meta
    /// directory, so isolation state survives process restarts.
    fn resume_from_disk(&self, inner: &mut Inner) {
        if let Ok(manifests) = catalog::load_manifest_dir(storage::meta_dir(&self.root)) {
            for manifest in manifests {
                inner
                    .packages
                    .entry(manifest.package.clone())
                    .or_insert(PackageRecord {
                        manifest,
                        users: BTreeSet::new(),
                    });
            }
        }

        let data_root = storage::data_root(&self.root);
        let Ok(user_entries) = fs::read_dir(&data_root) else {
            return;
        };
        for user_entry in user_entries.flatten() {
            let Some(user) = user_entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };
            let space = inner.spaces.entry(user).or_default();
            let Ok(package_entries) = fs::read_dir(user_entry.path()) else {
                continue;
            };
            let mut resumed = Vec::new();
            for package_entry in package_entries.flatten() {
                if !package_entry.path().is_dir() {
                    continue;
                }
                if let Some(package) = package_entry.file_name().to_str() {
                    space.insert(package.to_string());
                    resumed.push(package.to_string());
                }
            }
            for package in resumed {
                inner
                    .packages
                    .entry(package.clone())
                    .or_insert_with(|| PackageRecord {
                        manifest: PackageManifest::bare(&package),
                        users: BTreeSet::new(),
                    })
                    .users
                    .insert(user);
            }
        }
        debug!(
            packages = inner.packages.len(),
            spaces = inner.spaces.len(),
            "resumed isolation state"
        );
    }

    fn checked(&self) -> Option<MutexGuard<'_, Inner>> {
        let inner = self.lock();
        if !inner.initialized {
            error!("operation rejected: {}", Error::NotInitialized);
            return None;
        }
        Some(inner)
    }

    /// Copy a package already present on the host into `user`'s space.
    /// With `force` the absence of host metadata is tolerated.
    pub fn install_from_host(&self, package: &str, user: u32, force: bool) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        let manifest = match self.host.query(package) {
            Some(manifest) => manifest,
            None if force => {
                warn!(package, "absent from host; forcing bare install");
                PackageManifest::bare(package)
            }
            None => {
                warn!("{}", Error::PackageNotFound(package.to_string()));
                return false;
            }
        };
        self.install_manifest(&mut inner, manifest, user)
    }

    /// Install from a bundle on disk; the bundle's manifest yields the
    /// package identity. Unreadable or malformed bundles fail.
    pub fn install_from_bundle(&self, path: impl AsRef<Path>, user: u32) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        let manifest = match catalog::load_bundle_manifest(path.as_ref()) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("{}", Error::BadManifest(format!("{e:#}")));
                return false;
            }
        };
        self.install_manifest(&mut inner, manifest, user)
    }

    fn install_manifest(&self, inner: &mut Inner, manifest: PackageManifest, user: u32) -> bool {
        let package = manifest.package.clone();
        if let Err(e) = storage::init_package_dirs(&self.root, user, &package) {
            error!(package, user, "initializing package storage failed: {e}");
            return false;
        }
        self.write_meta(&manifest);

        inner.spaces.entry(user).or_default().insert(package.clone());
        inner
            .packages
            .entry(package.clone())
            .and_modify(|record| record.manifest = manifest.clone())
            .or_insert_with(|| PackageRecord {
                manifest,
                users: BTreeSet::new(),
            })
            .users
            .insert(user);
        debug!(package, user, "package installed");
        true
    }

    fn write_meta(&self, manifest: &PackageManifest) {
        let dir = storage::meta_dir(&self.root);
        let write = fs::create_dir_all(&dir).and_then(|()| {
            let body = serde_json::to_string_pretty(manifest).unwrap_or_default();
            fs::write(dir.join(format!("{}.json", manifest.package)), body)
        });
        if let Err(e) = write {
            warn!(package = manifest.package, "persisting manifest failed: {e}");
        }
    }

    fn remove_meta(&self, package: &str) {
        let path = storage::meta_dir(&self.root).join(format!("{package}.json"));
        if path.is_file() {
            if let Err(e) = fs::remove_file(&path) {
                warn!(package, "removing manifest failed: {e}");
            }
        }
    }

    /// Remove membership and erase the package's private storage under
    /// `user`'s space only. Returns false when not installed there.
    pub fn uninstall(&self, package: &str, user: u32) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        let removed = inner
            .spaces
            .get_mut(&user)
            .map(|space| space.remove(package))
            .unwrap_or(false);
        if !removed {
            debug!(package, user, "uninstall skipped: not installed");
            return false;
        }

        if let Err(e) = storage::remove_tree(&storage::package_dir(&self.root, user, package)) {
            warn!(package, user, "erasing package storage failed: {e}");
        }

        let fully_removed = if let Some(record) = inner.packages.get_mut(package) {
            record.users.remove(&user);
            record.users.is_empty()
        } else {
            false
        };
        if fully_removed {
            inner.packages.remove(package);
            self.remove_meta(package);
            debug!(package, "package fully uninstalled");
        }
        debug!(package, user, "package uninstalled");
        true
    }

    pub fn resolve_package(&self, package: &str, user: u32) -> Option<PackageMeta> {
        let inner = self.checked()?;
        if !inner
            .spaces
            .get(&user)
            .is_some_and(|space| space.contains(package))
        {
            return None;
        }
        let record = inner.packages.get(package)?;
        Some(PackageMeta {
            manifest: record.manifest.clone(),
            installed_users: record.users.clone(),
            data_root: storage::package_dir(&self.root, user, package),
        })
    }

    /// Snapshot of the packages installed in one user space.
    pub fn list_installed(&self, user: u32) -> Vec<PackageMeta> {
        let Some(inner) = self.checked() else {
            return Vec::new();
        };
        let Some(space) = inner.spaces.get(&user) else {
            return Vec::new();
        };
        space
            .iter()
            .filter_map(|package| {
                let record = inner.packages.get(package)?;
                Some(PackageMeta {
                    manifest: record.manifest.clone(),
                    installed_users: record.users.clone(),
                    data_root: storage::package_dir(&self.root, user, package),
                })
            })
            .collect()
    }

    pub fn is_installed(&self, package: &str, user: u32) -> bool {
        self.checked()
            .map(|inner| {
                inner
                    .spaces
                    .get(&user)
                    .is_some_and(|space| space.contains(package))
            })
            .unwrap_or(false)
    }

    /// Returns false when the space already exists.
    pub fn create_user_space(&self, user: u32) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        if inner.spaces.contains_key(&user) {
            return false;
        }
        if let Err(e) = fs::create_dir_all(storage::user_dir(&self.root, user)) {
            error!(user, "creating user space storage failed: {e}");
            return false;
        }
        inner.spaces.insert(user, BTreeSet::new());
        debug!(user, "user space created");
        true
    }

    /// Returns false for the default space or a space that does not
    /// exist; otherwise cascades erasure of every member package's
    /// storage under that space.
    pub fn delete_user_space(&self, user: u32) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        if user == DEFAULT_USER_ID {
            warn!("refusing to delete the default user space");
            return false;
        }
        let Some(space) = inner.spaces.remove(&user) else {
            return false;
        };
        for package in space {
            let fully_removed = if let Some(record) = inner.packages.get_mut(&package) {
                record.users.remove(&user);
                record.users.is_empty()
            } else {
                false
            };
            if fully_removed {
                inner.packages.remove(&package);
                self.remove_meta(&package);
            }
        }
        if let Err(e) = storage::remove_tree(&storage::user_dir(&self.root, user)) {
            warn!(user, "erasing user space storage failed: {e}");
        }
        debug!(user, "user space deleted");
        true
    }

    /// All user space ids, sorted.
    pub fn user_spaces(&self) -> Vec<u32> {
        let Some(inner) = self.checked() else {
            return Vec::new();
        };
        let mut ids: Vec<u32> = inner.spaces.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The package's private storage root for one user space, created on
    /// demand. `None` when the package is not installed there.
    pub fn package_data_dir(&self, package: &str, user: u32) -> Option<PathBuf> {
        if !self.is_installed(package, user) {
            return None;
        }
        match storage::init_package_dirs(&self.root, user, package) {
            Ok(dir) => Some(dir),
            Err(e) => {
                error!(package, user, "ensuring package storage failed: {e}");
                None
            }
        }
    }

    /// Erase a package's private storage under one user space without
    /// touching its membership.
    pub fn delete_package_data(&self, package: &str, user: u32) -> bool {
        if self.checked().is_none() {
            return false;
        }
        match storage::remove_tree(&storage::package_dir(&self.root, user, package)) {
            Ok(()) => true,
            Err(e) => {
                warn!(package, user, "erasing package data failed: {e}");
                false
            }
        }
    }

    /// Reset everything: delete every non-default space, empty the default
    /// space, and erase the whole storage tree.
    pub fn clear_all(&self) -> bool {
        let Some(mut inner) = self.checked() else {
            return false;
        };
        inner.packages.clear();
        inner.spaces.retain(|&user, _| user == DEFAULT_USER_ID);
        if let Some(space) = inner.spaces.get_mut(&DEFAULT_USER_ID) {
            space.clear();
        }
        match storage::remove_tree(&storage::virtual_root(&self.root)) {
            Ok(()) => {
                debug!("virtual environment cleared");
                true
            }
            Err(e) => {
                error!("clearing storage tree failed: {e}");
                false
            }
        }
    }

    /// Launch descriptor for an installed package, annotated with the
    /// isolated user id and the virtual-environment marker.
    pub fn launch_descriptor(&self, package: &str, user: u32) -> Option<LaunchDescriptor> {
        let meta = self.resolve_package(package, user)?;
        Some(LaunchDescriptor {
            package: meta.manifest.package,
            user_id: user,
            virtual_env: true,
            camera_substitution: true,
            data_dir: meta.data_root,
        })
    }
}

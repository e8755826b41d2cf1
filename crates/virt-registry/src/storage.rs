//! Deterministic on-disk layout for per-user-space package storage.
//!
//! `{root}/virtual/data/{user}/{package}/{cache,files,...}` is a public
//! contract: subdirectory names and presence are what hosted applications
//! expect of their private storage, and prior installs must keep
//! resolving to the same paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Private-storage subdirectories every installed package gets.
pub const DATA_SUBDIRS: [&str; 6] = [
    "cache",
    "files",
    "databases",
    "shared_prefs",
    "app_webview",
    "code_cache",
];

pub fn virtual_root(root: &Path) -> PathBuf {
    root.join("virtual")
}

pub fn data_root(root: &Path) -> PathBuf {
    virtual_root(root).join("data")
}

/// Manifests of installed packages, kept outside the data tree so hosted
/// applications never see them in their private storage.
pub fn meta_dir(root: &Path) -> PathBuf {
    virtual_root(root).join("meta")
}

pub fn user_dir(root: &Path, user: u32) -> PathBuf {
    data_root(root).join(user.to_string())
}

pub fn package_dir(root: &Path, user: u32, package: &str) -> PathBuf {
    user_dir(root, user).join(package)
}

/// Create the package's private storage tree, including every
/// compatibility subdirectory.
pub fn init_package_dirs(root: &Path, user: u32, package: &str) -> io::Result<PathBuf> {
    let dir = package_dir(root, user, package);
    for subdir in DATA_SUBDIRS {
        fs::create_dir_all(dir.join(subdir))?;
    }
    debug!(path = %dir.display(), "package storage initialized");
    Ok(dir)
}

/// Remove a directory tree; missing paths are not an error.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Wipe a package's storage except native libraries, then re-create the
/// standard subdirectories.
pub fn repair_package_dirs(root: &Path, user: u32, package: &str) -> io::Result<PathBuf> {
    let dir = package_dir(root, user, package);
    if dir.is_dir() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_name() == "lib" {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                remove_tree(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    init_package_dirs(root, user, package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_deterministic() {
        let root = Path::new("/srv/env");
        assert_eq!(
            package_dir(root, 5, "com.example.app"),
            PathBuf::from("/srv/env/virtual/data/5/com.example.app")
        );
    }

    #[test]
    fn init_creates_all_compat_subdirs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = init_package_dirs(tmp.path(), 0, "com.example.app").unwrap();
        for subdir in DATA_SUBDIRS {
            assert!(dir.join(subdir).is_dir(), "missing {subdir}");
        }
    }

    #[test]
    fn remove_tree_tolerates_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(remove_tree(&tmp.path().join("nope")).is_ok());
    }

    #[test]
    fn repair_keeps_native_libraries() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = init_package_dirs(tmp.path(), 2, "com.example.app").unwrap();
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("lib/native.so"), b"elf").unwrap();
        fs::write(dir.join("files/stale.db"), b"x").unwrap();

        repair_package_dirs(tmp.path(), 2, "com.example.app").unwrap();
        assert!(dir.join("lib/native.so").is_file());
        assert!(!dir.join("files/stale.db").exists());
        assert!(dir.join("shared_prefs").is_dir());
    }
}

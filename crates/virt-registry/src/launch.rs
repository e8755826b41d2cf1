//! Launch boundary: descriptors handed to the OS-level launcher, plus the
//! preparation/diagnosis helpers the launch orchestrator runs before
//! handing off to camera interception.

use crate::registry::VirtualEnv;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// Everything the isolated process needs to identify its context at
/// startup: the target package, its user space, and the
/// virtual-environment marker flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchDescriptor {
    pub package: String,
    pub user_id: u32,
    pub virtual_env: bool,
    pub camera_substitution: bool,
    pub data_dir: PathBuf,
}

/// Verify the installation and (re)initialize the storage subtree so the
/// launch cannot fail on missing directories.
pub fn prepare_for_launch(env: &VirtualEnv, package: &str, user: u32) -> bool {
    debug!(package, user, "preparing launch");

    if env.resolve_package(package, user).is_none() {
        error!(package, user, "launch preparation failed: not installed");
        return false;
    }

    let Some(data_dir) = env.package_data_dir(package, user) else {
        error!(package, user, "launch preparation failed: no data directory");
        return false;
    };

    debug!(path = %data_dir.display(), "launch preparation completed");
    true
}

/// Human-readable reasons a launch would fail; empty when nothing obvious
/// is wrong.
pub fn diagnose_launch_failure(env: &VirtualEnv, package: &str, user: u32) -> Vec<String> {
    let mut issues = Vec::new();

    if env.resolve_package(package, user).is_none() {
        issues.push("package not installed in this user space".to_string());
        return issues;
    }
    if env.launch_descriptor(package, user).is_none() {
        issues.push("no launch descriptor available".to_string());
    }
    match env.package_data_dir(package, user) {
        Some(dir) if dir.is_dir() => {}
        _ => issues.push("data directory missing or inaccessible".to_string()),
    }
    issues
}

/// Wipe a package's storage except native libraries and re-create the
/// standard subtree. Fixes most corrupted-install launch failures.
pub fn repair_installation(env: &VirtualEnv, package: &str, user: u32) -> bool {
    if env.resolve_package(package, user).is_none() {
        warn!(package, user, "repair skipped: not installed");
        return false;
    }
    match storage::repair_package_dirs(env.root(), user, package) {
        Ok(dir) => {
            debug!(path = %dir.display(), "installation repaired");
            true
        }
        Err(e) => {
            error!(package, user, "repairing installation failed: {e}");
            false
        }
    }
}

//! virt-registry: virtual environment registry
//!
//! Tracks which packages are installed in which isolated user spaces and
//! owns their private on-disk storage. Independent of camera concerns;
//! the launch workflow consults it before handing off to interception.

mod types;
pub use types::{PackageManifest, PackageMeta, DEFAULT_USER_ID};

mod error;
pub use error::{Error, Result};

pub mod storage;

mod catalog;
pub use catalog::{
    load_bundle_manifest, load_manifest_dir, load_manifest_file, DirCatalog, HostCatalog,
    MemoryCatalog,
};

mod registry;
pub use registry::VirtualEnv;

pub mod launch;
pub use launch::LaunchDescriptor;

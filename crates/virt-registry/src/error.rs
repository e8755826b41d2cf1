use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("registry not initialized")]
    NotInitialized,
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("user space not found: {0}")]
    SpaceNotFound(u32),
    #[error("bad manifest: {0}")]
    BadManifest(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

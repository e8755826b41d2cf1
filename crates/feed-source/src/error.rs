use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("feed manager not initialized")]
    NotInitialized,
    #[error("source not found: {0}")]
    NotFound(String),
    #[error("prepare failed: {0}")]
    PrepareFailed(String),
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("I/O error: {0}")]
    Io(String),
}

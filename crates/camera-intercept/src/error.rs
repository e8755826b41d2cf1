use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("binding target not found: {0}")]
    BindingNotFound(String),
    #[error("device error: {0}")]
    Device(String),
}

use crate::config::ConfigError;
use crate::context::ContainerError;
use thiserror::Error;

/// Top-level error type for the propwire library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("container error: {0}")]
    Container(#[from] ContainerError),
}

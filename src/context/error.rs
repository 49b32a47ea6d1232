use thiserror::Error;

use crate::config::{BoxError, ConfigError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContainerError {
    #[error("no bean of type {type_name} matches selector '{selector}'")]
    BeanNotFound {
        type_name: &'static str,
        selector: String,
    },

    #[error("selector '{selector}' matches {} beans of type {type_name}: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousBean {
        type_name: &'static str,
        selector: String,
        candidates: Vec<String>,
    },

    #[error("circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("bean '{bean}' failed to wire earlier")]
    WiringFailed { bean: String },

    #[error("parameter {index} expects {expected}, no argument given")]
    MissingArgument { index: usize, expected: &'static str },

    #[error("parameter {index} expects {expected}, got {found}")]
    InvalidArgument {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("{given} arguments given but the function takes {expected}")]
    TooManyArguments { expected: usize, given: usize },

    #[error("failed to construct bean '{bean}': {source}")]
    Construct { bean: String, source: BoxError },

    #[error("init callback of bean '{bean}' failed: {source}")]
    Init { bean: String, source: BoxError },

    #[error("invoked function failed: {0}")]
    Invoke(BoxError),

    #[error("failed to spawn task thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

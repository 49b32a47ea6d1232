use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by format decoders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported file type '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to decode '{ext}' content: {source}")]
    Decode { ext: String, source: BoxError },

    #[error("failed to convert value into properties: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("referenced property not found: {0}")]
    ReferenceNotFound(String),

    #[error("reference cycle detected: {}", .0.join(" -> "))]
    ReferenceCycle(Vec<String>),

    #[error("unclosed reference (missing '}}')")]
    UnclosedReference,

    #[error("invalid tag '{0}', expected '${{name}}' or '${{name:=default}}'")]
    InvalidTag(String),

    #[error("property not found: {key} (bound to {path})")]
    PropertyNotFound { key: String, path: String },

    #[error("{path} is a composite and cannot take a non-empty default (key {key})")]
    CompositeDefault { key: String, path: String },

    #[error("cannot convert '{value}' at {key} to {target}")]
    Coerce {
        key: String,
        value: String,
        target: &'static str,
    },
}

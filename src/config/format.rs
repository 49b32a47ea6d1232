//! Decoders keyed by file extension.

use std::collections::HashMap;
use std::fmt;

use super::error::BoxError;
use super::{ConfigError, Value};

/// Turns raw bytes into a value tree.
pub type Decoder = fn(&[u8]) -> Result<Value, BoxError>;

/// Table of decoders, populated once at startup and read-only afterwards.
///
/// Extensions are matched without the leading dot and case-insensitively, so
/// `".TOML"`, `"toml"` and `"Toml"` select the same decoder.
#[derive(Clone)]
pub struct FormatRegistry {
    decoders: HashMap<String, Decoder>,
}

impl FormatRegistry {
    /// Creates a registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers `decoder` for `ext`, replacing any earlier one.
    #[must_use]
    pub fn with(mut self, ext: &str, decoder: Decoder) -> Self {
        self.register(ext, decoder);
        self
    }

    pub fn register(&mut self, ext: &str, decoder: Decoder) {
        self.decoders.insert(normalize_ext(ext), decoder);
    }

    pub fn supports(&self, ext: &str) -> bool {
        self.decoders.contains_key(&normalize_ext(ext))
    }

    /// Decodes `bytes` with the decoder registered for `ext`.
    pub fn decode(&self, bytes: &[u8], ext: &str) -> Result<Value, ConfigError> {
        let ext = normalize_ext(ext);
        let decoder = self
            .decoders
            .get(&ext)
            .ok_or_else(|| ConfigError::UnsupportedFormat(ext.clone()))?;
        decoder(bytes).map_err(|source| ConfigError::Decode { ext, source })
    }
}

impl Default for FormatRegistry {
    /// Registry with the built-in `toml` and `json` decoders.
    fn default() -> Self {
        Self::empty().with("toml", decode_toml).with("json", decode_json)
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exts: Vec<&String> = self.decoders.keys().collect();
        exts.sort();
        f.debug_struct("FormatRegistry").field("extensions", &exts).finish()
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

pub fn decode_toml(bytes: &[u8]) -> Result<Value, BoxError> {
    let text = std::str::from_utf8(bytes)?;
    let table: toml::Table = toml::from_str(text)?;
    Ok(Value::from(toml::Value::Table(table)))
}

pub fn decode_json(bytes: &[u8]) -> Result<Value, BoxError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    Ok(Value::from(value))
}

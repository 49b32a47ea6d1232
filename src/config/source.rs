use std::fmt;

use super::{ConfigError, FormatRegistry, Properties, Value};

/// Something that contributes properties to a store.
///
/// Sources are applied in order; a later source overwrites colliding keys of
/// an earlier one.
pub trait PropertySource: Send + Sync + fmt::Debug {
    fn load_into(&self, props: &mut Properties, formats: &FormatRegistry) -> Result<(), ConfigError>;
}

/// A value set directly under a key.
#[derive(Debug, Clone)]
pub struct ValueSource {
    key: String,
    value: Value,
}

impl ValueSource {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl PropertySource for ValueSource {
    fn load_into(&self, props: &mut Properties, _formats: &FormatRegistry) -> Result<(), ConfigError> {
        props.set(&self.key, self.value.clone());
        Ok(())
    }
}

use std::path::Path;

use super::env::EnvSource;
use super::file::FileSource;
use super::source::{PropertySource, ValueSource};
use super::{ConfigError, FormatRegistry, Properties, Value};

/// Builder for loading properties from layered sources.
///
/// Sources are applied in registration order, with later sources overriding
/// earlier ones key by key. Composite values are flattened, so nested tables
/// from different files merge rather than replace each other.
///
/// ## Placeholders
///
/// Values are stored verbatim. `${path.to.key}` and `${key:=default}`
/// references are resolved when they are read through
/// [`Properties::resolve`] or [`Properties::bind`]:
///
/// ```toml
/// [server]
/// host = "localhost"
/// port = 8080
/// url = "http://${server.host}:${server.port}/api"
/// ```
///
/// ## Example
///
/// ```no_run
/// use propwire::Config;
///
/// let props = Config::builder()
///     .with_file("config/default.toml", true)
///     .with_env("MYAPP", "__")
///     .with_file("config/local.toml", false)
///     .build()?;
///
/// let url = props.resolve("${server.url}")?;
/// # Ok::<(), propwire::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .build() is called"]
pub struct Config {
    sources: Vec<Box<dyn PropertySource>>,
    formats: Option<FormatRegistry>,
}

impl Config {
    /// Creates a new configuration builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a file to be loaded; its extension selects the decoder.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are skipped.
    pub fn with_file(self, path: impl AsRef<Path>, required: bool) -> Self {
        self.with_source(FileSource::new(path, required))
    }

    /// Loads environment variables with the given prefix.
    ///
    /// `MYAPP__DATABASE__PORT=5432` with prefix `MYAPP` and separator `__`
    /// sets `database.port`.
    pub fn with_env(self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.with_source(EnvSource::new(prefix, separator))
    }

    /// Sets `value` under `key` at this point of the layering.
    pub fn with_value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_source(ValueSource::new(key, value))
    }

    /// Adds any other property source.
    pub fn with_source(mut self, source: impl PropertySource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Replaces the decoder table used by file sources.
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = Some(formats);
        self
    }

    /// Loads every source in order into a fresh store.
    pub fn build(self) -> Result<Properties, ConfigError> {
        let formats = self.formats.unwrap_or_default();
        let mut props = Properties::new();

        for source in &self.sources {
            source.load_into(&mut props, &formats)?;
        }

        tracing::debug!(sources = self.sources.len(), keys = props.len(), "configuration built");
        Ok(props)
    }
}

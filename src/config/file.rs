//! File-based property source.

use std::path::{Path, PathBuf};

use super::source::PropertySource;
use super::{ConfigError, FormatRegistry, Properties};

/// A property source that loads a file, picking the decoder by extension.
///
/// Files can be marked as required or optional. Required files that don't exist
/// cause an error; optional files that don't exist are skipped with a warning.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// Creates a new file source.
    ///
    /// If `required` is true, loading fails if the file doesn't exist.
    pub fn new(path: impl AsRef<Path>, required: bool) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required,
        }
    }
}

impl PropertySource for FileSource {
    fn load_into(&self, props: &mut Properties, formats: &FormatRegistry) -> Result<(), ConfigError> {
        match props.load(&self.path, formats) {
            Err(ConfigError::FileNotFound(path)) if !self.required => {
                tracing::warn!(path = %path.display(), "optional config file not found, skipping");
                Ok(())
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_source_loads_valid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "key = \"value\"\n[nested]\nport = 1").unwrap();

        let mut props = Properties::new();
        FileSource::new(file.path(), true)
            .load_into(&mut props, &FormatRegistry::default())
            .unwrap();

        assert_eq!(props.get("key"), Some("value"));
        assert_eq!(props.get("nested.port"), Some("1"));
    }

    #[test]
    fn test_file_source_required_missing() {
        let source = FileSource::new("/nonexistent/path/config.toml", true);
        let result = source.load_into(&mut Properties::new(), &FormatRegistry::default());

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_file_source_optional_missing() {
        let source = FileSource::new("/nonexistent/path/config.toml", false);
        let mut props = Properties::new();
        source.load_into(&mut props, &FormatRegistry::default()).unwrap();

        assert!(props.is_empty());
    }

    #[test]
    fn test_file_source_unsupported_extension() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "key = 1").unwrap();

        let result = FileSource::new(file.path(), true).load_into(&mut Properties::new(), &FormatRegistry::default());
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}

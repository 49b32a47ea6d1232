use super::source::PropertySource;
use super::{ConfigError, FormatRegistry, Properties};

/// Loads environment variables sharing a prefix.
///
/// `MYAPP__DATABASE__HOST=db` with prefix `MYAPP` and separator `__` becomes
/// the property `database.host = db`. Path segments are lowercased; values are
/// kept verbatim.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        assert!(!separator.is_empty(), "separator must not be empty");
        Self {
            prefix: prefix.into(),
            separator,
        }
    }

    fn apply(&self, props: &mut Properties, vars: impl IntoIterator<Item = (String, String)>) {
        let prefix_with_sep = format!("{}{}", self.prefix, self.separator);

        for (key, value) in vars {
            let Some(path) = key.strip_prefix(&prefix_with_sep) else {
                continue;
            };
            if path.is_empty() {
                continue;
            }

            let key = path
                .split(self.separator.as_str())
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(".");
            props.set(&key, value);
        }
    }
}

impl PropertySource for EnvSource {
    fn load_into(&self, props: &mut Properties, _formats: &FormatRegistry) -> Result<(), ConfigError> {
        self.apply(props, std::env::vars());
        Ok(())
    }
}

//! Configuration loading, placeholder resolution and binding.

mod bind;
mod builder;
mod env;
mod error;
mod file;
mod format;
mod properties;
mod resolve;
mod source;
mod value;

pub use bind::{Bind, BindOptions, Binder, Kind};
pub use builder::Config;
pub use env::EnvSource;
pub use error::{BoxError, ConfigError};
pub use file::FileSource;
pub use format::{decode_json, decode_toml, Decoder, FormatRegistry};
pub use properties::{Properties, ROOT_KEY};
pub use resolve::{parse_tag, resolve_string, Tag};
pub use source::{PropertySource, ValueSource};
pub use value::Value;

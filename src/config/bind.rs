//! Binding flat properties onto structured values.
//!
//! A target describes its own shape through [`Bind`]: its [`Kind`] and, for
//! records, which fields it has and the tag each one is bound with. The
//! [`Binder`] walks that shape, scoping every field tag under the current key.
//!
//! ```
//! use propwire::{bindable, Properties};
//!
//! #[derive(Debug, Default)]
//! struct Pool {
//!     url: String,
//!     size: u32,
//! }
//!
//! bindable!(Pool {
//!     url: "${url}",
//!     size: "${size:=4}",
//! });
//!
//! let props = Properties::from_map([("db.url", "postgres://localhost")]);
//! let mut pool = Pool::default();
//! props.bind_with(&mut pool, propwire::BindOptions::key("db"))?;
//! assert_eq!(pool.size, 4);
//! # Ok::<(), propwire::ConfigError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use super::properties::{join, normalize};
use super::resolve::{parse_tag, resolve_tag, Tag};
use super::{ConfigError, Properties};

/// Shape of a bindable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Scalar,
    Record,
    Sequence,
    Mapping,
}

impl Kind {
    pub fn is_composite(self) -> bool {
        !matches!(self, Kind::Scalar)
    }
}

/// A value that can be populated from properties.
pub trait Bind {
    const KIND: Kind = Kind::Record;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError>;
}

/// Where binding starts: a key (`db`) or a full tag (`${db:=}`).
///
/// The default binds at the root scope.
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    tag: Option<String>,
}

impl BindOptions {
    pub fn key(key: impl AsRef<str>) -> Self {
        Self {
            tag: Some(format!("${{{}}}", key.as_ref())),
        }
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Self { tag: Some(tag.into()) }
    }
}

pub(crate) fn bind_root<T: Bind + ?Sized>(
    props: &Properties,
    target: &mut T,
    opts: &BindOptions,
) -> Result<(), ConfigError> {
    let tag = parse_tag(opts.tag.as_deref().unwrap_or("${}"))?;
    Binder::new(props, &tag, short_type_name::<T>()).bind_value(target)
}

/// Cursor over the property store positioned at one key.
#[derive(Debug)]
pub struct Binder<'a> {
    props: &'a Properties,
    key: String,
    default: Option<String>,
    // false for `${:=x}` tags, which never look the key up
    lookup: bool,
    path: String,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(props: &'a Properties, tag: &Tag, path: String) -> Self {
        let key = normalize(&tag.key).to_string();
        Self {
            props,
            lookup: !key.is_empty(),
            key,
            default: tag.default.clone(),
            path,
        }
    }

    /// Full property key this binder reads.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Type path of the value being bound, such as `Server.pool.size`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn default(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn properties(&self) -> &'a Properties {
        self.props
    }

    /// Binds one field of a record. `tag` is scoped under this binder's key.
    pub fn field<T: Bind + ?Sized>(&mut self, name: &str, tag: &str, target: &mut T) -> Result<(), ConfigError> {
        let tag = parse_tag(tag)?;
        let mut child = Binder::new(self.props, &tag, format!("{}.{}", self.path, name));
        if child.lookup {
            child.key = join(&self.key, &child.key);
        } else {
            child.key = self.key.clone();
        }
        child.bind_value(target)
    }

    /// Binder for element `index` of a sequence.
    pub fn element(&self, index: usize) -> Binder<'a> {
        self.child(format!("{}[{index}]", self.key), format!("{}[{index}]", self.path))
    }

    /// Binder for entry `name` of a mapping.
    pub fn entry(&self, name: &str) -> Binder<'a> {
        self.child(join(&self.key, name), format!("{}.{}", self.path, name))
    }

    /// Names of the entries stored below this key.
    pub fn entries(&self) -> Vec<String> {
        self.props.group(&self.key)
    }

    /// `true` when this key is looked up and a leaf or sub-key exists for it.
    pub fn exists(&self) -> bool {
        self.lookup && self.props.has(&self.key)
    }

    /// The resolved text at this key, falling back to the resolved default.
    ///
    /// `Ok(None)` means absent with no default.
    pub fn value(&self) -> Result<Option<String>, ConfigError> {
        let tag = Tag {
            key: if self.lookup { self.key.clone() } else { String::new() },
            default: self.default.clone(),
        };
        resolve_tag(self.props, &tag)
    }

    /// Like [`value`](Self::value) but absence is an error.
    pub fn require(&self) -> Result<String, ConfigError> {
        self.value()?.ok_or_else(|| ConfigError::PropertyNotFound {
            key: self.key.clone(),
            path: self.path.clone(),
        })
    }

    /// Reads the required value and converts it with `convert`.
    pub fn convert<T>(&self, convert: impl FnOnce(&str) -> Option<T>) -> Result<T, ConfigError> {
        let text = self.require()?;
        convert(&text).ok_or_else(|| ConfigError::Coerce {
            key: self.key.clone(),
            value: text,
            target: std::any::type_name::<T>(),
        })
    }

    fn bind_value<T: Bind + ?Sized>(mut self, target: &mut T) -> Result<(), ConfigError> {
        if T::KIND.is_composite() && self.default.as_deref().is_some_and(|d| !d.is_empty()) {
            return Err(ConfigError::CompositeDefault {
                key: self.key.clone(),
                path: self.path.clone(),
            });
        }
        target.bind(&mut self)
    }

    fn child(&self, key: String, path: String) -> Binder<'a> {
        Binder {
            props: self.props,
            key,
            default: None,
            lookup: true,
            path,
        }
    }

    fn rebase<'s>(&self, props: &'s Properties) -> Binder<'s> {
        Binder {
            props,
            key: self.key.clone(),
            default: None,
            lookup: true,
            path: self.path.clone(),
        }
    }
}

/// Root name used in error paths. Collections are named after their
/// element type, so a failing `Vec<Pool>` reports `Pool[0].url`.
fn short_type_name<T: ?Sized>() -> String {
    short_name(std::any::type_name::<T>())
}

fn short_name(full: &str) -> String {
    let (base, params) = match full.split_once('<') {
        Some((base, rest)) => (base, rest.strip_suffix('>').unwrap_or(rest)),
        None => (full, ""),
    };
    let base = base.rsplit("::").next().unwrap_or(base);
    let element = match base {
        "Vec" | "Option" | "VecDeque" => 0,
        "HashMap" | "BTreeMap" => 1,
        _ => return base.to_string(),
    };
    match generic_params(params).get(element) {
        Some(param) => short_name(param),
        None => base.to_string(),
    }
}

/// Splits `A, B<C, D>` at top-level commas.
fn generic_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut start) = (0usize, 0);
    for (pos, c) in params.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(params[start..pos].trim());
                start = pos + 1;
            }
            _ => {}
        }
    }
    if !params[start..].trim().is_empty() {
        parts.push(params[start..].trim());
    }
    parts
}

/// Implements [`Bind`] for a record by listing `field: "tag"` pairs.
#[macro_export]
macro_rules! bindable {
    ($ty:ty { $($field:ident : $tag:expr),* $(,)? }) => {
        impl $crate::config::Bind for $ty {
            fn bind(
                &mut self,
                binder: &mut $crate::config::Binder<'_>,
            ) -> ::std::result::Result<(), $crate::config::ConfigError> {
                $( binder.field(stringify!($field), $tag, &mut self.$field)?; )*
                Ok(())
            }
        }
    };
}

macro_rules! bind_from_str {
    ($($ty:ty),*) => {
        $(
            impl Bind for $ty {
                const KIND: Kind = Kind::Scalar;

                fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
                    *self = binder.convert(|s| s.trim().parse::<$ty>().ok())?;
                    Ok(())
                }
            }
        )*
    };
}

bind_from_str!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl Bind for String {
    const KIND: Kind = Kind::Scalar;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = binder.require()?;
        Ok(())
    }
}

impl Bind for bool {
    const KIND: Kind = Kind::Scalar;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = binder.convert(parse_bool)?;
        Ok(())
    }
}

impl Bind for char {
    const KIND: Kind = Kind::Scalar;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = binder.convert(|s| {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        })?;
        Ok(())
    }
}

impl Bind for PathBuf {
    const KIND: Kind = Kind::Scalar;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = PathBuf::from(binder.require()?);
        Ok(())
    }
}

impl Bind for Duration {
    const KIND: Kind = Kind::Scalar;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = binder.convert(parse_duration)?;
        Ok(())
    }
}

impl<T: Bind + Default> Bind for Option<T> {
    const KIND: Kind = T::KIND;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        let present = match T::KIND {
            Kind::Scalar => binder.exists(),
            _ => binder.props.has(&binder.key),
        };
        if !present && binder.default.is_none() {
            *self = None;
            return Ok(());
        }
        let mut value = T::default();
        value.bind(binder)?;
        *self = Some(value);
        Ok(())
    }
}

impl<T: Bind + Default> Bind for Vec<T> {
    const KIND: Kind = Kind::Sequence;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        let mut items = Vec::new();

        if binder.lookup && binder.props.has(&format!("{}[0]", binder.key)) {
            let mut index = 0;
            loop {
                let element = binder.element(index);
                if !element.exists() {
                    break;
                }
                let mut item = T::default();
                element.bind_value(&mut item)?;
                items.push(item);
                index += 1;
            }
        } else {
            // A scalar value is read as a comma separated list.
            let text = binder.require()?;
            let mut scratch = Properties::new();
            for (index, part) in text.split(',').map(str::trim).filter(|p| !p.is_empty()).enumerate() {
                scratch.set(&format!("{}[{index}]", binder.key), part.replace("${", "$${"));
            }
            let base = binder.rebase(&scratch);
            for index in 0..scratch.len() {
                let mut item = T::default();
                base.element(index).bind_value(&mut item)?;
                items.push(item);
            }
        }

        *self = items;
        Ok(())
    }
}

impl<T: Bind + Default> Bind for HashMap<String, T> {
    const KIND: Kind = Kind::Mapping;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        let mut map = HashMap::new();
        for (name, value) in bind_entries::<T>(binder)? {
            map.insert(name, value);
        }
        *self = map;
        Ok(())
    }
}

impl<T: Bind + Default> Bind for BTreeMap<String, T> {
    const KIND: Kind = Kind::Mapping;

    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), ConfigError> {
        *self = bind_entries::<T>(binder)?.into_iter().collect();
        Ok(())
    }
}

fn bind_entries<T: Bind + Default>(binder: &Binder<'_>) -> Result<Vec<(String, T)>, ConfigError> {
    let names = binder.entries();
    if names.is_empty() && binder.default.is_none() {
        return Err(ConfigError::PropertyNotFound {
            key: binder.key.clone(),
            path: binder.path.clone(),
        });
    }

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let mut value = T::default();
        binder.entry(&name).bind_value(&mut value)?;
        entries.push((name, value));
    }
    Ok(entries)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parses `90`, `1h30m`, `1.5s` or `250ms`. A bare integer is seconds.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if s.is_empty() {
        return None;
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        if number_end == 0 {
            return None;
        }
        let number: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "d" => 86_400e9,
            _ => return None,
        };
        nanos += number * scale;
        rest = &rest[unit_end..];
    }
    Some(Duration::from_nanos(nanos as u64))
}

//! Flat property store.

use std::collections::BTreeMap;
use std::path::Path;

use super::bind::{bind_root, Bind, BindOptions};
use super::format::FormatRegistry;
use super::resolve::resolve_string;
use super::{ConfigError, Value};

/// Key of the root scope. `$` and a leading `$.` are accepted anywhere a key is.
pub const ROOT_KEY: &str = "$";

/// Configuration held as a flat mapping from leaf keys to string values.
///
/// Keys are case-sensitive. `a.b.c` addresses a field of nested records and
/// `a[0].b` addresses an element of a sequence. Every key names a leaf: setting
/// a composite under `a` replaces a previous leaf `a`, and setting a leaf `a`
/// drops everything previously stored below it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store by flattening every entry of `map`.
    pub fn from_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut props = Self::new();
        for (key, value) in map {
            props.set(key.as_ref(), value);
        }
        props
    }

    /// Decodes `bytes` with the decoder registered for `ext` into a new store.
    pub fn from_bytes(bytes: &[u8], ext: &str, formats: &FormatRegistry) -> Result<Self, ConfigError> {
        let mut props = Self::new();
        props.read(bytes, ext, formats)?;
        Ok(props)
    }

    /// Loads a file into a new store, choosing the decoder by its extension.
    pub fn from_file(path: impl AsRef<Path>, formats: &FormatRegistry) -> Result<Self, ConfigError> {
        let mut props = Self::new();
        props.load(path, formats)?;
        Ok(props)
    }

    /// Decodes `bytes` and flattens the result into this store.
    pub fn read(&mut self, bytes: &[u8], ext: &str, formats: &FormatRegistry) -> Result<(), ConfigError> {
        let value = formats.decode(bytes, ext)?;
        self.set(ROOT_KEY, value);
        Ok(())
    }

    /// Reads a file and flattens it into this store.
    pub fn load(&mut self, path: impl AsRef<Path>, formats: &FormatRegistry) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.read(&bytes, ext, formats)?;
        tracing::debug!(path = %path.display(), keys = self.entries.len(), "loaded properties");
        Ok(())
    }

    /// Stores `value` under `key`, flattening composites into leaf keys.
    ///
    /// Map entries become `key.name` and sequence items `key[i]`. Existing
    /// values for colliding keys are overwritten; empty composites add no keys.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let key = normalize(key).to_string();
        self.set_value(key, value.into());
    }

    /// Flattens any serializable value under `key`.
    pub fn set_serialized<T: serde::Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), ConfigError> {
        self.set(key, Value::from_serialize(value)?);
        Ok(())
    }

    fn set_value(&mut self, key: String, value: Value) {
        match value {
            Value::Map(map) => {
                self.entries.remove(&key);
                for (name, value) in map {
                    self.set_value(join(&key, &name), value);
                }
            }
            Value::Seq(items) => {
                self.entries.remove(&key);
                for (i, value) in items.into_iter().enumerate() {
                    self.set_value(format!("{key}[{i}]"), value);
                }
            }
            scalar => {
                if key.is_empty() {
                    return;
                }
                self.remove_children(&key);
                self.remove_ancestors(&key);
                let text = scalar.as_scalar().unwrap_or_default();
                self.entries.insert(key, text);
            }
        }
    }

    // `a.b[0]` cannot coexist with leaves at `a` or `a.b`
    fn remove_ancestors(&mut self, key: &str) {
        for (pos, c) in key.char_indices() {
            if pos > 0 && (c == '.' || c == '[') {
                self.entries.remove(&key[..pos]);
            }
        }
    }

    fn remove_children(&mut self, key: &str) {
        let dot = format!("{key}.");
        let bracket = format!("{key}[");
        self.entries
            .retain(|k, _| !(k.starts_with(&dot) || k.starts_with(&bracket)));
    }

    /// Returns the raw value stored for `key`, or `None` if it is absent.
    ///
    /// `Some("")` is a present but empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(normalize(key)).map(String::as_str)
    }

    /// Returns the stored value for `key` or the string form of `default`.
    pub fn get_or(&self, key: &str, default: impl ToString) -> String {
        match self.get(key) {
            Some(value) => value.to_string(),
            None => default.to_string(),
        }
    }

    /// Returns `true` when `key` is a leaf or has any sub-key.
    pub fn has(&self, key: &str) -> bool {
        let key = normalize(key);
        if key.is_empty() {
            return !self.entries.is_empty();
        }
        if self.entries.contains_key(key) {
            return true;
        }
        self.subkeys(key).next().is_some()
    }

    /// All leaf keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the distinct first-level segment names below `prefix`.
    ///
    /// With the root key (or an empty prefix) this is every top-level segment.
    /// Only `.` separates segments, so `list[0].x` groups as `list[0]`.
    pub fn group(&self, prefix: &str) -> Vec<String> {
        let prefix = normalize(prefix);
        let mut groups: Vec<String> = Vec::new();

        for key in self.entries.keys() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix).and_then(|r| r.strip_prefix('.')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            let segment = rest.split('.').next().unwrap_or(rest);
            if !groups.iter().any(|g| g == segment) {
                groups.push(segment.to_string());
            }
        }
        groups
    }

    /// Copies every leaf of `other` over this store.
    pub fn merge(&mut self, other: &Properties) {
        for (key, value) in &other.entries {
            self.set_value(key.clone(), Value::String(value.clone()));
        }
    }

    /// Rebuilds the nested value stored below `key`.
    ///
    /// Returns `None` when nothing is stored there. Leaves come back as strings.
    pub fn to_value(&self, key: &str) -> Option<Value> {
        let key = normalize(key);
        if let Some(leaf) = self.entries.get(key) {
            return Some(Value::String(leaf.clone()));
        }

        // no real sequence is longer than the store itself
        let limit = self.entries.len();
        let mut root = Value::Map(BTreeMap::new());
        let mut found = false;
        for (full, leaf) in &self.entries {
            let rest = if key.is_empty() {
                full.as_str()
            } else {
                match full.strip_prefix(key) {
                    Some(rest) if rest.starts_with('.') || rest.starts_with('[') => {
                        rest.strip_prefix('.').unwrap_or(rest)
                    }
                    _ => continue,
                }
            };
            found = true;
            insert_path(&mut root, &split_path(rest, limit), Value::String(leaf.clone()));
        }
        found.then_some(root)
    }

    /// Resolves `${...}` references in `s` against this store.
    pub fn resolve(&self, s: &str) -> Result<String, ConfigError> {
        resolve_string(self, s)
    }

    /// Binds the whole store onto `target`.
    pub fn bind<T: Bind + ?Sized>(&self, target: &mut T) -> Result<(), ConfigError> {
        self.bind_with(target, BindOptions::default())
    }

    /// Binds onto `target` starting from the key or tag in `opts`.
    pub fn bind_with<T: Bind + ?Sized>(&self, target: &mut T, opts: BindOptions) -> Result<(), ConfigError> {
        bind_root(self, target, &opts)
    }

    fn subkeys<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.entries
            .range::<str, _>((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
            .map(|(k, _)| k)
            .take_while(move |k| k.starts_with(key))
            .filter(move |k| matches!(k.as_bytes().get(key.len()), Some(b'.') | Some(b'[')))
    }
}

/// Strips the root scope marker from a key.
pub(crate) fn normalize(key: &str) -> &str {
    if key == ROOT_KEY {
        return "";
    }
    key.strip_prefix("$.").unwrap_or(key)
}

/// Joins a parent key and a child segment; the root joins to the bare child.
pub(crate) fn join(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}.{child}"),
    }
}

enum Segment<'a> {
    Name(&'a str),
    Index(usize),
}

/// Splits `a.b[1].c` into `Name(a) Name(b) Index(1) Name(c)`.
///
/// Indices at or above `limit` and malformed brackets are kept as names.
fn split_path(path: &str, limit: usize) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut indices) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !name.is_empty() {
            segments.push(Segment::Name(name));
        }
        while !indices.is_empty() {
            let index = indices.strip_prefix('[').and_then(|inner| {
                let close = inner.find(']')?;
                let i = inner[..close].parse::<usize>().ok().filter(|&i| i < limit)?;
                Some((i, &inner[close + 1..]))
            });
            match index {
                Some((i, rest)) => {
                    segments.push(Segment::Index(i));
                    indices = rest;
                }
                None => {
                    segments.push(Segment::Name(indices));
                    break;
                }
            }
        }
    }
    segments
}

fn insert_path(node: &mut Value, path: &[Segment<'_>], leaf: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = leaf;
        return;
    };

    let child = match first {
        Segment::Name(name) => {
            if !matches!(node, Value::Map(_)) {
                *node = Value::Map(BTreeMap::new());
            }
            let Value::Map(map) = node else { return };
            map.entry((*name).to_string()).or_insert(Value::Null)
        }
        Segment::Index(i) => {
            if !matches!(node, Value::Seq(_)) {
                *node = Value::Seq(Vec::new());
            }
            let Value::Seq(items) = node else { return };
            if items.len() <= *i {
                items.resize(*i + 1, Value::Null);
            }
            &mut items[*i]
        }
    };
    insert_path(child, rest, leaf);
}

//! Placeholder resolution for property values.
//!
//! Supports `${key}` and `${key:=default}` references, where the default may
//! itself contain references (`${a:=${b:=1}}`). An empty key (`${:=text}`)
//! always yields its default. Use `$${...}` to produce a literal `${...}`.

use super::{ConfigError, Properties};

/// A parsed `${key:=default}` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub default: Option<String>,
}

impl Tag {
    /// Returns `true` when the default is present and not empty.
    pub fn has_value_default(&self) -> bool {
        self.default.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Parses a tag of the form `${key}`, `${key:=default}` or `${:=default}`.
pub fn parse_tag(tag: &str) -> Result<Tag, ConfigError> {
    let invalid = || ConfigError::InvalidTag(tag.to_string());

    let inner = tag
        .strip_prefix("${")
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(invalid)?;

    // The whole tag must be one balanced reference.
    if find_reference(tag)? != Some((0, tag.len() - 1)) {
        return Err(invalid());
    }

    Ok(match inner.split_once(":=") {
        Some((key, default)) => Tag {
            key: key.trim().to_string(),
            default: Some(default.to_string()),
        },
        None => Tag {
            key: inner.trim().to_string(),
            default: None,
        },
    })
}

/// Resolves every reference in `s` against `props`.
pub fn resolve_string(props: &Properties, s: &str) -> Result<String, ConfigError> {
    Resolver::new(props).string(s)
}

/// Resolves a parsed tag: the stored value of its key if present, else its
/// default. Returns `Ok(None)` when the key is absent and there is no default.
pub(crate) fn resolve_tag(props: &Properties, tag: &Tag) -> Result<Option<String>, ConfigError> {
    Resolver::new(props).tag(tag)
}

/// Tracks the chain of keys currently being resolved.
struct Resolver<'a> {
    props: &'a Properties,
    chain: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(props: &'a Properties) -> Self {
        Self {
            props,
            chain: Vec::new(),
        }
    }

    fn string(&mut self, s: &str) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        loop {
            if let Some(pos) = rest.find("$${") {
                // An escape that comes before any reference is copied literally.
                let next_ref = find_reference(rest)?.map(|(start, _)| start);
                if next_ref.map_or(true, |start| pos < start) {
                    result.push_str(&rest[..pos]);
                    result.push_str("${");
                    rest = &rest[pos + 3..];
                    continue;
                }
            }

            match find_reference(rest)? {
                None => {
                    result.push_str(rest);
                    return Ok(result);
                }
                Some((start, end)) => {
                    result.push_str(&rest[..start]);
                    let tag = parse_tag(&rest[start..=end])?;
                    match self.tag(&tag)? {
                        Some(value) => result.push_str(&value),
                        None => return Err(ConfigError::ReferenceNotFound(tag.key)),
                    }
                    rest = &rest[end + 1..];
                }
            }
        }
    }

    fn tag(&mut self, tag: &Tag) -> Result<Option<String>, ConfigError> {
        if tag.key.is_empty() {
            return self.default(tag);
        }

        if self.chain.iter().any(|k| *k == tag.key) {
            let mut chain = self.chain.clone();
            chain.push(tag.key.clone());
            return Err(ConfigError::ReferenceCycle(chain));
        }

        let props = self.props;
        self.chain.push(tag.key.clone());
        let resolved = match props.get(&tag.key) {
            Some(raw) => self.string(raw).map(Some),
            None => self.default(tag),
        };
        self.chain.pop();
        resolved
    }

    fn default(&mut self, tag: &Tag) -> Result<Option<String>, ConfigError> {
        match &tag.default {
            Some(default) => self.string(default).map(Some),
            None => Ok(None),
        }
    }
}

/// Finds the first `${` and its balanced closing brace, returning byte offsets
/// of the `$` and the `}`. Escaped `$${` openers are skipped.
fn find_reference(s: &str) -> Result<Option<(usize, usize)>, ConfigError> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut start = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'$') && bytes.get(i + 2) == Some(&b'{') => {
                if depth == 0 {
                    i += 3;
                    continue;
                }
                i += 1;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
                i += 2;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok(start.map(|start| (start, i)));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    if depth > 0 {
        return Err(ConfigError::UnclosedReference);
    }
    Ok(None)
}

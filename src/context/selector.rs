use std::any::{type_name, TypeId};
use std::fmt;

use super::bean::{BeanMeta, State};

/// Query used to pick beans.
///
/// An empty string converts to [`Selector::Inferred`], any other string to a
/// [`Selector::Name`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selector {
    /// Any bean providing the requested type.
    #[default]
    Inferred,
    /// The bean registered under this name.
    Name(String),
    /// Beans that provide this type, concrete or exported.
    Type { id: TypeId, name: &'static str },
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Selector::Name(name.into())
    }

    pub fn of<T: ?Sized + 'static>() -> Self {
        Selector::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub(crate) fn matches(&self, meta: &BeanMeta) -> bool {
        match self {
            Selector::Inferred => true,
            Selector::Name(name) => meta.name == *name,
            Selector::Type { id, .. } => meta.exports.iter().any(|e| e.type_id == *id),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Inferred => f.write_str("<inferred>"),
            Selector::Name(name) => f.write_str(name),
            Selector::Type { name, .. } => write!(f, "type {name}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Selector::Inferred
        } else {
            Selector::Name(s.to_string())
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// What [`find`](super::Container::find) reports about a bean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanInfo {
    pub name: String,
    pub type_name: &'static str,
    /// Every type the bean can be looked up as, its own type first.
    pub exports: Vec<&'static str>,
    pub state: State,
}

impl BeanInfo {
    pub(crate) fn new(meta: &BeanMeta, state: State) -> Self {
        Self {
            name: meta.name.clone(),
            type_name: meta.type_name,
            exports: meta.exports.iter().map(|e| e.type_name).collect(),
            state,
        }
    }
}

//! Route parameters and their (possibly bound) values.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The value of a route parameter.
///
/// Parameters start out as raw strings captured from the path. A model
/// binder may replace a string with a domain value; handler argument
/// resolution may also produce `Null` or an injected instance.
#[derive(Clone)]
pub enum Value {
    /// A raw string captured from the URL.
    Str(String),
    /// An absent value for a nullable parameter.
    Null,
    /// A domain value produced by a binder or by injection.
    Bound(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps a domain value.
    pub fn bound<T: Any + Send + Sync>(value: T) -> Self {
        Self::Bound(Arc::new(value))
    }

    /// Returns the raw string, if this is still one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bound domain value as `T`.
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Bound(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Null => f.write_str("Null"),
            Self::Bound(_) => f.write_str("Bound(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Parameters extracted from a matched route, in capture order.
///
/// Inline regex groups have no name and are only reachable by position.
#[derive(Debug, Clone, Default)]
pub struct Params {
    entries: Vec<(Option<String>, Value)>,
}

impl Params {
    /// Creates new empty params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named parameter, replacing an existing one of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.as_deref() == Some(name.as_str()))
        {
            entry.1 = value;
        } else {
            self.entries.push((Some(name), value));
        }
    }

    /// Appends a positional parameter.
    pub fn push_positional(&mut self, value: impl Into<Value>) {
        self.entries.push((None, value.into()));
    }

    /// Gets a parameter by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_deref() == Some(name))
            .map(|(_, v)| v)
    }

    /// Gets a parameter by name as a raw string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Gets a bound parameter by name as `T`.
    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(Value::downcast)
    }

    /// Parses a raw string parameter as a specific type.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get_str(name).and_then(|v| v.parse().ok())
    }

    /// Gets a parameter by position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, v)| v)
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_deref(), v))
    }

    /// Applies `f` to every named entry, replacing its value.
    pub(crate) fn try_map_named<F, E>(mut self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(&str, Value) -> Result<Value, E>,
    {
        for (name, value) in &mut self.entries {
            if let Some(name) = name {
                let current = std::mem::replace(value, Value::Null);
                *value = f(name, current)?;
            }
        }
        Ok(self)
    }

    /// Prepends all entries of `other`.
    pub(crate) fn prepend(&mut self, other: Self) {
        let mut entries = other.entries;
        entries.append(&mut self.entries);
        self.entries = entries;
    }
}

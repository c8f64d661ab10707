//! Model binding: turning raw path parameters into domain values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::params::{Params, Value};

/// Resolves a raw parameter string into a domain value.
pub type Resolver = Arc<dyn Fn(&str) -> Result<Value> + Send + Sync>;

/// Per-parameter resolvers, applied right after a route matches.
#[derive(Clone, Default)]
pub struct ModelBinder {
    resolvers: HashMap<String, Resolver>,
}

impl ModelBinder {
    /// Creates a binder with no resolvers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the resolver for parameters named `param`.
    pub fn bind<F>(&mut self, param: impl Into<String>, resolver: F)
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.resolvers.insert(param.into(), Arc::new(resolver));
    }

    /// Returns true if a resolver is registered for `param`.
    pub fn is_bound(&self, param: &str) -> bool {
        self.resolvers.contains_key(param)
    }

    /// Resolves every bound parameter. Parameters without a resolver, and
    /// values that are no longer raw strings, are left untouched.
    pub fn apply(&self, params: Params) -> Result<Params> {
        if self.resolvers.is_empty() {
            return Ok(params);
        }
        params.try_map_named(|name, value| match (self.resolvers.get(name), &value) {
            (Some(resolver), Value::Str(raw)) => resolver(raw),
            _ => Ok(value),
        })
    }
}

impl fmt::Debug for ModelBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBinder")
            .field("params", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}

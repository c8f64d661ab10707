//! Route storage, lookup and the persisted route cache.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, RouterError};
use crate::handler::{Handler, HandlerRef, HandlerRegistry};
use crate::params::Params;
use crate::pattern::{self, CompiledRegex, Matcher, PlaceholderRegistry};
use crate::request::Method;

/// A host constraint on a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subdomain {
    /// The pattern as registered, e.g. `:account.example.com`.
    pub pattern: String,
    /// The compiled host matcher.
    pub matcher: CompiledRegex,
}

impl Subdomain {
    /// Compiles a subdomain pattern.
    pub fn new(pattern: &str, registry: &PlaceholderRegistry) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: pattern::compile_host(pattern, registry)?,
        })
    }
}

/// A single route definition.
#[derive(Debug, Clone)]
pub struct Route {
    /// HTTP method.
    pub method: Method,
    /// Normalized path pattern.
    pub pattern: String,
    /// Compiled matcher for the pattern.
    pub matcher: Matcher,
    /// Request handler.
    pub handler: Handler,
    /// Middleware aliases, in declaration order.
    pub middleware: Vec<String>,
    /// Namespace the route was declared in.
    pub namespace: Option<String>,
    /// Optional host constraint.
    pub subdomain: Option<Subdomain>,
    /// Optional route name for URL generation.
    pub name: Option<String>,
}

impl Route {
    /// Creates a new route, compiling its pattern.
    pub fn new(
        method: Method,
        pattern: &str,
        handler: Handler,
        registry: &PlaceholderRegistry,
    ) -> Result<Self> {
        let pattern = pattern::normalize(pattern);
        Ok(Self {
            method,
            matcher: pattern::compile(&pattern, registry)?,
            pattern,
            handler,
            middleware: Vec::new(),
            namespace: None,
            subdomain: None,
            name: None,
        })
    }

    /// Matches a request against this route.
    ///
    /// Subdomain captures come before path captures.
    pub fn matches(&self, method: Method, path: &str, host: Option<&str>) -> Option<Params> {
        if self.method != method {
            return None;
        }
        let host_params = match &self.subdomain {
            Some(subdomain) => Some(subdomain.matcher.captures(host?)?),
            None => None,
        };
        let mut params = self.matcher.matches(path)?;
        if let Some(host_params) = host_params {
            params.prepend(host_params);
        }
        Some(params)
    }

    fn static_key(&self) -> String {
        static_key(self.method, &self.pattern)
    }

    fn to_cached(&self) -> Result<CachedRoute> {
        let handler = self.handler.reference();
        if handler == HandlerRef::Closure {
            return Err(RouterError::UncacheableRoute(format!(
                "{} {}",
                self.method, self.pattern
            )));
        }
        Ok(CachedRoute {
            method: self.method,
            pattern: self.pattern.clone(),
            matcher: self.matcher.clone(),
            handler,
            middleware: self.middleware.clone(),
            namespace: self.namespace.clone(),
            subdomain: self.subdomain.clone(),
            name: self.name.clone(),
        })
    }

    fn from_cached(cached: CachedRoute, handlers: &HandlerRegistry) -> Result<Self> {
        Ok(Self {
            method: cached.method,
            pattern: cached.pattern,
            matcher: cached.matcher,
            handler: handlers.resolve(&cached.handler)?,
            middleware: cached.middleware,
            namespace: cached.namespace,
            subdomain: cached.subdomain,
            name: cached.name,
        })
    }
}

fn static_key(method: Method, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

/// Resolves a named route template to a URL.
fn resolve_named(
    named: &HashMap<String, String>,
    name: &str,
    params: &HashMap<String, String>,
    defaults: &HashMap<String, String>,
) -> Result<String> {
    let template = named
        .get(name)
        .ok_or_else(|| RouterError::NamedRouteNotFound(name.to_string()))?;
    pattern::fill_template(name, template, params, defaults)
}

/// The three route indices.
///
/// Static routes are found by exact `METHOD:path` lookup. Dynamic routes
/// are tried in registration order and the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    static_index: HashMap<String, Route>,
    dynamic: Vec<Route>,
    named: HashMap<String, String>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route.
    ///
    /// Routes with a subdomain are always kept with the dynamic routes so
    /// the host can be checked. A second route with the same name replaces
    /// the first one's URL template.
    pub fn add_route(&mut self, route: Route) {
        if let Some(name) = &route.name {
            if let Some(previous) = self.named.insert(name.clone(), route.pattern.clone()) {
                warn!(
                    name = %name,
                    previous = %previous,
                    replacement = %route.pattern,
                    "route name registered twice, keeping the latest"
                );
            }
        }

        if route.matcher.is_static() && route.subdomain.is_none() {
            let key = route.static_key();
            debug!(key = %key, handler = %route.handler.reference(), "static route");
            if self.static_index.insert(key.clone(), route).is_some() {
                warn!(key = %key, "static route registered twice, keeping the latest");
            }
        } else {
            debug!(
                method = %route.method,
                pattern = %route.pattern,
                handler = %route.handler.reference(),
                "dynamic route"
            );
            self.dynamic.push(route);
        }
    }

    /// Looks up a static route.
    pub fn lookup_static(&self, method: Method, uri: &str) -> Option<&Route> {
        self.static_index.get(&static_key(method, uri))
    }

    /// Finds the first dynamic route matching the request.
    pub fn match_dynamic(
        &self,
        method: Method,
        uri: &str,
        host: Option<&str>,
    ) -> Option<(&Route, Params)> {
        self.dynamic
            .iter()
            .find_map(|route| route.matches(method, uri, host).map(|params| (route, params)))
    }

    /// Finds a route: static index first, then dynamic routes.
    pub fn find(&self, method: Method, uri: &str, host: Option<&str>) -> Option<(&Route, Params)> {
        self.lookup_static(method, uri)
            .map(|route| (route, Params::new()))
            .or_else(|| self.match_dynamic(method, uri, host))
    }

    /// Generates a URL for a named route.
    pub fn resolve_url(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        defaults: &HashMap<String, String>,
    ) -> Result<String> {
        resolve_named(&self.named, name, params, defaults)
    }

    /// Returns the URL template of a named route.
    pub fn named(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Iterates static routes (by key) followed by dynamic routes (in
    /// registration order).
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        let mut statics: Vec<&Route> = self.static_index.values().collect();
        statics.sort_by(|a, b| a.pattern.cmp(&b.pattern).then(a.method.cmp(&b.method)));
        statics.into_iter().chain(self.dynamic.iter())
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.static_index.len() + self.dynamic.len()
    }

    /// Returns true if no routes are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the table into its cacheable form.
    pub fn to_cacheable(&self) -> Result<CachedTable> {
        Ok(CachedTable {
            static_index: self
                .static_index
                .iter()
                .map(|(key, route)| Ok((key.clone(), route.to_cached()?)))
                .collect::<Result<_>>()?,
            dynamic: self
                .dynamic
                .iter()
                .map(Route::to_cached)
                .collect::<Result<_>>()?,
            named: self
                .named
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            generated_at: Utc::now(),
        })
    }

    /// Rebuilds a table from its cacheable form.
    pub fn from_cacheable(cached: CachedTable, handlers: &HandlerRegistry) -> Result<Self> {
        Ok(Self {
            static_index: cached
                .static_index
                .into_iter()
                .map(|(key, route)| Ok((key, Route::from_cached(route, handlers)?)))
                .collect::<Result<_>>()?,
            dynamic: cached
                .dynamic
                .into_iter()
                .map(|route| Route::from_cached(route, handlers))
                .collect::<Result<_>>()?,
            named: cached.named.into_iter().collect(),
        })
    }
}

/// A route as stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRoute {
    pub method: Method,
    pub pattern: String,
    pub matcher: Matcher,
    pub handler: HandlerRef,
    #[serde(default)]
    pub middleware: Vec<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub subdomain: Option<Subdomain>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The serialized form of a [`RouteTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTable {
    pub static_index: BTreeMap<String, CachedRoute>,
    pub dynamic: Vec<CachedRoute>,
    pub named: BTreeMap<String, String>,
    pub generated_at: DateTime<Utc>,
}

impl CachedTable {
    /// Iterates static routes followed by dynamic routes.
    pub fn routes(&self) -> impl Iterator<Item = &CachedRoute> {
        self.static_index.values().chain(self.dynamic.iter())
    }

    /// Generates a URL for a named route without rebuilding the table.
    pub fn resolve_url(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        defaults: &HashMap<String, String>,
    ) -> Result<String> {
        let template = self
            .named
            .get(name)
            .ok_or_else(|| RouterError::NamedRouteNotFound(name.to_string()))?;
        pattern::fill_template(name, template, params, defaults)
    }
}

/// A route cache file.
///
/// The cache is never invalidated automatically: after changing routes,
/// clear it (or run `oxide-routes clear`).
#[derive(Debug, Clone)]
pub struct RouteCache {
    path: PathBuf,
}

impl RouteCache {
    /// Creates a cache at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached table, if the cache file exists.
    pub fn load(&self) -> Result<Option<CachedTable>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the table, replacing any previous cache.
    pub fn store(&self, table: &CachedTable) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(table)?)?;
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), routes = table.static_index.len() + table.dynamic.len(), "route cache written");
        Ok(())
    }

    /// Deletes the cache file. Returns false if there was none.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "route cache cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

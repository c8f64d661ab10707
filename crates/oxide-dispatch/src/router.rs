//! Route registration.
//!
//! Routes are declared on a [`RouterBuilder`] during bootstrap. Building
//! compiles every pattern and seals the result into a read-only
//! [`Router`], which is then shared by reference with the serving loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::binder::ModelBinder;
use crate::config::RouterConfig;
use crate::cors::{CorsNegotiator, CorsOptions};
use crate::dispatch::{ErrorSink, TracingSink};
use crate::error::{Result, RouterError};
use crate::handler::{Controller, Handler, HandlerRegistry};
use crate::middleware::{self, Middleware, MiddlewareBinding};
use crate::params::Value;
use crate::pattern::{self, PlaceholderRegistry};
use crate::rate_limit::{
    Clock, FileStore, MemoryStore, RateLimitRule, RateLimitStore, RateLimiter, SystemClock,
};
use crate::request::{Method, Request};
use crate::response::Response;
use crate::table::{Route, RouteCache, RouteTable, Subdomain};

/// Renders the response for unmatched requests.
pub type NotFoundHandler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Renders the response for an error status.
pub type ErrorHandler = Arc<dyn Fn(&Request, &RouterError) -> Response + Send + Sync>;

/// A route declaration.
///
/// ```ignore
/// builder.add(
///     RouteDef::new(Method::Get, "/users/:id", Handler::controller::<UserController>("show"))
///         .name("users.show")
///         .middleware(&["auth"]),
/// )
/// ```
#[derive(Debug, Clone)]
pub struct RouteDef {
    methods: Vec<Method>,
    pattern: String,
    handler: Handler,
    name: Option<String>,
    middleware: Vec<String>,
    subdomain: Option<String>,
}

impl RouteDef {
    /// Declares a route for one method.
    pub fn new(method: Method, pattern: &str, handler: Handler) -> Self {
        Self::with_methods(&[method], pattern, handler)
    }

    /// Declares a route for several methods.
    pub fn with_methods(methods: &[Method], pattern: &str, handler: Handler) -> Self {
        Self {
            methods: methods.to_vec(),
            pattern: pattern.to_string(),
            handler,
            name: None,
            middleware: Vec::new(),
            subdomain: None,
        }
    }

    /// Names the route for URL generation.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds middleware aliases, run after group middleware.
    #[must_use]
    pub fn middleware(mut self, aliases: &[&str]) -> Self {
        self.middleware
            .extend(aliases.iter().map(|s| (*s).to_string()));
        self
    }

    /// Restricts the route to hosts matching `pattern`.
    #[must_use]
    pub fn subdomain(mut self, pattern: impl Into<String>) -> Self {
        self.subdomain = Some(pattern.into());
        self
    }
}

/// Attributes shared by the routes of a group.
#[derive(Debug, Clone, Default)]
pub struct GroupAttributes {
    prefix: String,
    namespace: Option<String>,
    name_prefix: String,
    middleware: Vec<String>,
    subdomain: Option<String>,
}

impl GroupAttributes {
    /// Creates empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefixes the patterns of the group.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the namespace recorded on the group's routes.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Prefixes the names of the group's routes.
    #[must_use]
    pub fn name(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Adds middleware aliases for the group.
    #[must_use]
    pub fn middleware(mut self, aliases: &[&str]) -> Self {
        self.middleware
            .extend(aliases.iter().map(|s| (*s).to_string()));
        self
    }

    /// Restricts the group to hosts matching `pattern`.
    #[must_use]
    pub fn subdomain(mut self, pattern: impl Into<String>) -> Self {
        self.subdomain = Some(pattern.into());
        self
    }

    /// Nests `inner` inside these attributes.
    fn merge(&self, inner: Self) -> Self {
        Self {
            prefix: format!("{}/{}", self.prefix, inner.prefix),
            namespace: match (&self.namespace, inner.namespace) {
                (Some(outer), Some(inner)) => Some(format!("{outer}::{inner}")),
                (outer, inner) => inner.or_else(|| outer.clone()),
            },
            name_prefix: format!("{}{}", self.name_prefix, inner.name_prefix),
            middleware: self
                .middleware
                .iter()
                .cloned()
                .chain(inner.middleware)
                .collect(),
            subdomain: inner.subdomain.or_else(|| self.subdomain.clone()),
        }
    }
}

/// A declared route with its group attributes applied.
#[derive(Debug, Clone)]
struct PendingRoute {
    method: Method,
    pattern: String,
    handler: Handler,
    name: Option<String>,
    middleware: Vec<String>,
    namespace: Option<String>,
    subdomain: Option<String>,
}

/// (action, method, path suffix) of the resource routes.
const RESOURCE_ACTIONS: [(&str, Method, &str); 8] = [
    ("index", Method::Get, ""),
    ("create", Method::Get, "/create"),
    ("store", Method::Post, ""),
    ("show", Method::Get, "/:id"),
    ("edit", Method::Get, "/:id/edit"),
    ("update", Method::Put, "/:id"),
    ("update", Method::Patch, "/:id"),
    ("destroy", Method::Delete, "/:id"),
];

/// Collects routes and settings during bootstrap.
pub struct RouterBuilder {
    config: RouterConfig,
    placeholders: PlaceholderRegistry,
    url_defaults: HashMap<String, String>,
    routes: Vec<PendingRoute>,
    scope: GroupAttributes,
    handlers: HandlerRegistry,
    binder: ModelBinder,
    global: Vec<MiddlewareBinding>,
    aliases: HashMap<String, Arc<dyn Middleware>>,
    limits: Vec<(String, usize, i64)>,
    store: Option<Arc<dyn RateLimitStore>>,
    clock: Arc<dyn Clock>,
    cors: Option<CorsOptions>,
    not_found: Option<NotFoundHandler>,
    error_handlers: HashMap<u16, ErrorHandler>,
    sink: Arc<dyn ErrorSink>,
    errors: Vec<RouterError>,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Creates a builder from a configuration.
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            cors: config.cors.clone(),
            config,
            placeholders: PlaceholderRegistry::new(),
            url_defaults: HashMap::new(),
            routes: Vec::new(),
            scope: GroupAttributes::default(),
            handlers: HandlerRegistry::new(),
            binder: ModelBinder::new(),
            global: Vec::new(),
            aliases: HashMap::new(),
            limits: Vec::new(),
            store: None,
            clock: Arc::new(SystemClock),
            not_found: None,
            error_handlers: HashMap::new(),
            sink: Arc::new(TracingSink),
            errors: Vec::new(),
        }
    }

    /// Replaces the configuration. CORS settings in `config`, if any,
    /// replace those set earlier.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        if let Some(cors) = &config.cors {
            self.cors = Some(cors.clone());
        }
        self.config = config;
        self
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Get, pattern, handler)
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Post, pattern, handler)
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Put, pattern, handler)
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Patch, pattern, handler)
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Delete, pattern, handler)
    }

    /// Adds an OPTIONS route. With CORS enabled, OPTIONS requests are
    /// answered by the preflight and never reach it.
    #[must_use]
    pub fn options(self, pattern: &str, handler: Handler) -> Self {
        self.route(Method::Options, pattern, handler)
    }

    /// Adds a route for every method in [`Method::ANY`].
    #[must_use]
    pub fn any(self, pattern: &str, handler: Handler) -> Self {
        self.match_methods(&Method::ANY, pattern, handler)
    }

    /// Adds a route for the given methods.
    #[must_use]
    pub fn match_methods(self, methods: &[Method], pattern: &str, handler: Handler) -> Self {
        self.add(RouteDef::with_methods(methods, pattern, handler))
    }

    /// Adds a route with any method.
    #[must_use]
    pub fn route(self, method: Method, pattern: &str, handler: Handler) -> Self {
        self.add(RouteDef::new(method, pattern, handler))
    }

    /// Adds a named route.
    #[must_use]
    pub fn named_route(self, name: &str, method: Method, pattern: &str, handler: Handler) -> Self {
        self.add(RouteDef::new(method, pattern, handler).name(name))
    }

    /// Adds a route declaration, applying the enclosing group attributes.
    #[must_use]
    pub fn add(mut self, def: RouteDef) -> Self {
        if let Err(e) = def.handler.validate() {
            self.errors.push(e);
            return self;
        }
        self.handlers.register(&def.handler);

        let pattern = format!("{}/{}", self.scope.prefix, def.pattern);
        let name = def
            .name
            .map(|name| format!("{}{}", self.scope.name_prefix, name));
        let middleware: Vec<String> = self
            .scope
            .middleware
            .iter()
            .cloned()
            .chain(def.middleware)
            .collect();
        let subdomain = def.subdomain.or_else(|| self.scope.subdomain.clone());

        for (i, method) in def.methods.iter().enumerate() {
            self.routes.push(PendingRoute {
                method: *method,
                pattern: pattern.clone(),
                handler: def.handler.clone(),
                // A multi-method route is named once, by its first method.
                name: if i == 0 { name.clone() } else { None },
                middleware: middleware.clone(),
                namespace: self.scope.namespace.clone(),
                subdomain: subdomain.clone(),
            });
        }
        self
    }

    /// Registers the resource routes of controller `C` under `prefix`.
    ///
    /// Routes are named `<name>.<action>`; `name` defaults to the prefix
    /// with slashes turned into dots. Actions `C` does not declare are
    /// skipped.
    #[must_use]
    pub fn resource<C: Controller>(self, prefix: &str, name: Option<&str>) -> Self {
        self.resource_routes::<C>(prefix, name, false)
    }

    /// Like [`RouterBuilder::resource`], without the `create` and `edit`
    /// form routes.
    #[must_use]
    pub fn api_resource<C: Controller>(self, prefix: &str, name: Option<&str>) -> Self {
        self.resource_routes::<C>(prefix, name, true)
    }

    fn resource_routes<C: Controller>(mut self, prefix: &str, name: Option<&str>, api: bool) -> Self {
        let base = pattern::normalize(prefix);
        let name = name.map_or_else(
            || base.trim_start_matches('/').replace('/', "."),
            str::to_string,
        );

        let mut named = Vec::new();
        for (action, method, suffix) in RESOURCE_ACTIONS {
            if api && (action == "create" || action == "edit") {
                continue;
            }
            let handler = Handler::controller::<C>(action);
            if !handler.is_declared() {
                debug!(controller = C::name(), action, "resource action not declared, skipping");
                continue;
            }
            let mut def = RouteDef::new(method, &format!("{base}{suffix}"), handler);
            if !named.contains(&action) {
                named.push(action);
                def = def.name(format!("{name}.{action}"));
            }
            self = self.add(def);
        }
        self
    }

    /// Registers routes with shared attributes.
    ///
    /// ```ignore
    /// builder.group(GroupAttributes::new().prefix("/admin").middleware(&["auth"]), |admin| {
    ///     admin.get("/dashboard", dashboard)
    /// })
    /// ```
    #[must_use]
    pub fn group(mut self, attributes: GroupAttributes, routes: impl FnOnce(Self) -> Self) -> Self {
        let outer = std::mem::take(&mut self.scope);
        self.scope = outer.merge(attributes);
        let mut this = routes(self);
        this.scope = outer;
        this
    }

    /// Registers routes that only match hosts matching `pattern`.
    #[must_use]
    pub fn subdomain(self, pattern: &str, routes: impl FnOnce(Self) -> Self) -> Self {
        self.group(GroupAttributes::new().subdomain(pattern), routes)
    }

    /// Adds global middleware with the default priority.
    #[must_use]
    pub fn middleware(self, mw: impl Middleware + 'static) -> Self {
        self.push_global(Arc::new(mw), None)
    }

    /// Adds global middleware; higher priorities run first.
    #[must_use]
    pub fn middleware_with_priority(self, mw: impl Middleware + 'static, priority: i32) -> Self {
        self.push_global(Arc::new(mw), Some(priority))
    }

    fn push_global(mut self, middleware: Arc<dyn Middleware>, priority: Option<i32>) -> Self {
        self.global.push(MiddlewareBinding {
            middleware,
            priority,
        });
        self
    }

    /// Names middleware so groups and routes can refer to it.
    #[must_use]
    pub fn alias(mut self, name: &str, mw: impl Middleware + 'static) -> Self {
        self.aliases.insert(name.to_string(), Arc::new(mw));
        self
    }

    /// Sets a default value used by URL generation for `:key`.
    #[must_use]
    pub fn placeholder(mut self, key: &str, value: impl Into<String>) -> Self {
        self.url_defaults.insert(key.to_string(), value.into());
        self
    }

    /// Sets the regex fragment matched by `:name` placeholders.
    #[must_use]
    pub fn pattern(mut self, name: &str, fragment: &str) -> Self {
        if let Err(e) = self.placeholders.define(name, fragment) {
            self.errors.push(e);
        }
        self
    }

    /// Registers a resolver for parameters named `param`.
    #[must_use]
    pub fn bind<F>(mut self, param: &str, resolver: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.binder.bind(param, resolver);
        self
    }

    /// Enables CORS.
    #[must_use]
    pub fn enable_cors(mut self, options: CorsOptions) -> Self {
        self.cors = Some(options);
        self
    }

    /// Allows each client `max_attempts` requests to URLs matching `pattern`
    /// per `per_minutes` minutes.
    #[must_use]
    pub fn rate_limit(mut self, pattern: &str, max_attempts: usize, per_minutes: i64) -> Self {
        self.limits
            .push((pattern.to_string(), max_attempts, per_minutes));
        self
    }

    /// Sets the store for rate-limit records.
    #[must_use]
    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the clock used by rate limiting.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the handler for unmatched requests.
    #[must_use]
    pub fn not_found<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(handler));
        self
    }

    /// Sets the handler for errors with the given status.
    #[must_use]
    pub fn error_handler<F>(mut self, status: u16, handler: F) -> Self
    where
        F: Fn(&Request, &RouterError) -> Response + Send + Sync + 'static,
    {
        self.error_handlers.insert(status, Arc::new(handler));
        self
    }

    /// Sets where unexpected failures are reported.
    #[must_use]
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Makes controller `C` resolvable from the route cache.
    #[must_use]
    pub fn register_controller<C: Controller>(mut self) -> Self {
        self.handlers.register_controller::<C>();
        self
    }

    /// Makes a static method handler resolvable from the route cache.
    #[must_use]
    pub fn register_static(mut self, handler: &Handler) -> Self {
        self.handlers.register(handler);
        self
    }

    /// Compiles the declared routes and seals the router.
    pub fn build(mut self) -> Result<Router> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }

        let mut table = RouteTable::new();
        for pending in std::mem::take(&mut self.routes) {
            let mut route = Route::new(
                pending.method,
                &pending.pattern,
                pending.handler,
                &self.placeholders,
            )?;
            route.name = pending.name;
            route.middleware = pending.middleware;
            route.namespace = pending.namespace;
            route.subdomain = pending
                .subdomain
                .map(|s| Subdomain::new(&s, &self.placeholders))
                .transpose()?;
            table.add_route(route);
        }
        self.seal(table)
    }

    /// Restores the route table from `cache` if present; otherwise declares
    /// routes with `routes`, builds, and writes the cache.
    ///
    /// On a cache hit `routes` is not called, so every controller and
    /// static method the routes use must have been registered with
    /// [`RouterBuilder::register_controller`] / [`RouterBuilder::register_static`].
    pub fn build_cached(self, cache: &RouteCache, routes: impl FnOnce(Self) -> Self) -> Result<Router> {
        if let Some(cached) = cache.load()? {
            info!(path = %cache.path().display(), generated_at = %cached.generated_at, "loading routes from cache");
            let table = RouteTable::from_cacheable(cached, &self.handlers)?;
            return self.seal(table);
        }
        let router = routes(self).build()?;
        router.cache_to(cache)?;
        Ok(router)
    }

    /// Builds with the route cache at [`RouterConfig::cache_path`], or
    /// without a cache when none is configured.
    pub fn build_cached_from_config(self, routes: impl FnOnce(Self) -> Self) -> Result<Router> {
        match self.config.cache_path.clone() {
            Some(path) => self.build_cached(&RouteCache::new(path), routes),
            None => routes(self).build(),
        }
    }

    fn seal(self, table: RouteTable) -> Result<Router> {
        for route in table.routes() {
            if let Some(alias) = route.middleware.iter().find(|a| !self.aliases.contains_key(*a)) {
                return Err(RouterError::UnknownMiddleware(alias.clone()));
            }
        }

        let limits = self
            .limits
            .iter()
            .map(|(pattern, max, minutes)| {
                RateLimitRule::new(pattern, *max, *minutes, &self.placeholders)
            })
            .collect::<Result<Vec<_>>>()?;
        let store: Arc<dyn RateLimitStore> = match (self.store, &self.config.rate_limit_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(FileStore::new(dir)),
            (None, None) => Arc::new(MemoryStore::new()),
        };

        let mut limiter = RateLimiter::new(store, self.clock);
        if let Some(longest) = limits.iter().map(|rule| rule.window).max() {
            limiter = limiter.retain_for(longest);
        }

        info!(routes = table.len(), rate_limits = limits.len(), cors = self.cors.is_some(), "router built");
        Ok(Router {
            table,
            binder: self.binder,
            global: middleware::sort_bindings(&self.global),
            aliases: self.aliases,
            limiter,
            limits,
            cors: self.cors.map(CorsNegotiator::new),
            not_found: self.not_found,
            error_handlers: self.error_handlers,
            url_defaults: self.url_defaults,
            config: self.config,
            sink: self.sink,
        })
    }
}

/// The sealed router.
pub struct Router {
    pub(crate) table: RouteTable,
    pub(crate) binder: ModelBinder,
    pub(crate) global: Vec<Arc<dyn Middleware>>,
    pub(crate) aliases: HashMap<String, Arc<dyn Middleware>>,
    pub(crate) limiter: RateLimiter,
    pub(crate) limits: Vec<RateLimitRule>,
    pub(crate) cors: Option<CorsNegotiator>,
    pub(crate) not_found: Option<NotFoundHandler>,
    pub(crate) error_handlers: HashMap<u16, ErrorHandler>,
    pub(crate) url_defaults: HashMap<String, String>,
    pub(crate) config: RouterConfig,
    pub(crate) sink: Arc<dyn ErrorSink>,
}

impl Router {
    /// Starts declaring routes.
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Returns the route table.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Generates a URL for a named route.
    ///
    /// Placeholders not given in `params` fall back to the values set with
    /// [`RouterBuilder::placeholder`].
    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let params: HashMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        self.table.resolve_url(name, &params, &self.url_defaults)
    }

    /// Generates a URL for a named route without parameters.
    pub fn url(&self, name: &str) -> Result<String> {
        self.table.resolve_url(name, &HashMap::new(), &self.url_defaults)
    }

    /// Writes the route table to `cache`.
    pub fn cache_to(&self, cache: &RouteCache) -> Result<()> {
        cache.store(&self.table.to_cacheable()?)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.table.len())
            .field("global_middleware", &self.global.len())
            .field("aliases", &self.aliases.keys().collect::<Vec<_>>())
            .field("rate_limits", &self.limits.len())
            .field("cors", &self.cors.is_some())
            .field("environment", &self.config.environment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Args, Parameter};

    fn text(body: &'static str) -> Handler {
        Handler::closure(move |_| Ok(Response::text(body)))
    }

    struct PhotoController;

    impl Controller for PhotoController {
        fn construct() -> std::result::Result<Self, String> {
            Ok(Self)
        }

        fn parameters(action: &str) -> Option<Vec<Parameter>> {
            match action {
                "index" | "create" | "store" => Some(Vec::new()),
                "show" | "edit" | "update" | "destroy" => Some(vec![Parameter::new("id")]),
                _ => None,
            }
        }

        fn call(&mut self, action: &str, args: &Args) -> Result<Response> {
            Ok(Response::text(format!("{action} {}", args.str("id").unwrap_or("-"))))
        }
    }

    struct ReadOnlyController;

    impl Controller for ReadOnlyController {
        fn construct() -> std::result::Result<Self, String> {
            Ok(Self)
        }

        fn parameters(action: &str) -> Option<Vec<Parameter>> {
            match action {
                "index" => Some(Vec::new()),
                "show" => Some(vec![Parameter::new("id")]),
                _ => None,
            }
        }

        fn call(&mut self, action: &str, _args: &Args) -> Result<Response> {
            Ok(Response::text(action.to_string()))
        }
    }

    #[test]
    fn test_group_attributes_nest() {
        let router = Router::builder()
            .alias("auth", middleware::from_fn(|_req: &Request, params, next: middleware::Next<'_>| next.run(params)))
            .alias("admin", middleware::from_fn(|_req: &Request, params, next: middleware::Next<'_>| next.run(params)))
            .group(
                GroupAttributes::new()
                    .prefix("/admin/")
                    .namespace("Admin")
                    .name("admin.")
                    .middleware(&["auth"]),
                |admin| {
                    admin.group(
                        GroupAttributes::new()
                            .prefix("users")
                            .namespace("Users")
                            .name("users.")
                            .middleware(&["admin"]),
                        |users| users.named_route("index", Method::Get, "/", text("users")),
                    )
                },
            )
            .get("/outside", text("outside"))
            .build()
            .unwrap();

        let route = router.table().lookup_static(Method::Get, "/admin/users").unwrap();
        assert_eq!(route.name.as_deref(), Some("admin.users.index"));
        assert_eq!(route.namespace.as_deref(), Some("Admin::Users"));
        assert_eq!(route.middleware, vec!["auth".to_string(), "admin".to_string()]);

        let outside = router.table().lookup_static(Method::Get, "/outside").unwrap();
        assert!(outside.middleware.is_empty());
        assert!(outside.namespace.is_none());
        assert_eq!(router.url("admin.users.index").unwrap(), "/admin/users");
    }

    #[test]
    fn test_resource_routes() {
        let router = Router::builder()
            .resource::<PhotoController>("/photos", None)
            .build()
            .unwrap();
        assert_eq!(router.table().len(), 8);
        assert_eq!(router.url_for("photos.show", [("id", 3)]).unwrap(), "/photos/3");
        assert_eq!(router.url_for("photos.edit", [("id", 3)]).unwrap(), "/photos/3/edit");
        assert_eq!(router.url("photos.create").unwrap(), "/photos/create");
        assert!(router.table().lookup_static(Method::Get, "/photos/create").is_some());
        assert!(router.table().match_dynamic(Method::Patch, "/photos/3", None).is_some());
    }

    #[test]
    fn test_api_resource_skips_forms_and_undeclared_actions() {
        let router = Router::builder()
            .api_resource::<PhotoController>("api/photos", Some("photos"))
            .api_resource::<ReadOnlyController>("/reports", None)
            .build()
            .unwrap();
        // index, store, show, update (PUT + PATCH), destroy
        // plus index and show for reports.
        assert_eq!(router.table().len(), 8);
        assert!(router.url("photos.create").is_err());
        assert_eq!(router.url("photos.index").unwrap(), "/api/photos");
        assert!(router.url("reports.destroy").is_err());
    }

    #[test]
    fn test_invalid_registrations_fail_build() {
        let bad_pattern = Router::builder().get("/users/:", text("x")).build();
        assert!(matches!(bad_pattern, Err(RouterError::InvalidPattern { .. })));

        let bad_placeholder = Router::builder().pattern("year", "(\\d{4})").build();
        assert!(matches!(bad_placeholder, Err(RouterError::InvalidPattern { .. })));

        let bad_handler = Router::builder()
            .get("/", Handler::controller::<ReadOnlyController>("destroy"))
            .build();
        assert!(matches!(bad_handler, Err(RouterError::InvalidHandler(_))));

        let bad_alias = Router::builder()
            .add(RouteDef::new(Method::Get, "/", text("x")).middleware(&["missing"]))
            .build();
        assert!(matches!(bad_alias, Err(RouterError::UnknownMiddleware(name)) if name == "missing"));
    }

    #[test]
    fn test_patterns_apply_regardless_of_order() {
        let router = Router::builder()
            .get("/years/:year", text("year"))
            .pattern("year", "[0-9]{4}")
            .build()
            .unwrap();
        assert!(router.table().match_dynamic(Method::Get, "/years/2024", None).is_some());
        assert!(router.table().match_dynamic(Method::Get, "/years/24", None).is_none());
    }

    #[test]
    fn test_any_and_match_methods() {
        let router = Router::builder()
            .named_route("ping", Method::Get, "/ping", text("pong"))
            .any("/anything", text("any"))
            .match_methods(&[Method::Get, Method::Post], "/form", text("form"))
            .build()
            .unwrap();
        for method in Method::ANY {
            assert!(router.table().lookup_static(method, "/anything").is_some());
        }
        assert!(router.table().lookup_static(Method::Post, "/form").is_some());
        assert!(router.table().lookup_static(Method::Delete, "/form").is_none());
        assert_eq!(router.url("ping").unwrap(), "/ping");
    }

    #[test]
    fn test_url_defaults() {
        let router = Router::builder()
            .placeholder("locale", "en")
            .named_route("docs", Method::Get, "/:locale/docs/:page", text("docs"))
            .build()
            .unwrap();
        assert_eq!(router.url_for("docs", [("page", "intro")]).unwrap(), "/en/docs/intro");
        assert_eq!(
            router.url_for("docs", [("page", "intro"), ("locale", "fr")]).unwrap(),
            "/fr/docs/intro"
        );
        assert!(matches!(
            router.url_for("missing", [("page", "intro")]),
            Err(RouterError::NamedRouteNotFound(_))
        ));
        assert!(matches!(
            router.url("docs"),
            Err(RouterError::UrlParameterMissing { param, .. }) if param == "page"
        ));
    }
}

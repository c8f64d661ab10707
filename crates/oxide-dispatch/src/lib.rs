//! # oxide-dispatch
//!
//! Request routing and dispatch for MVC web applications.
//!
//! This crate provides:
//! - URL patterns with `:name` placeholders and inline regex groups
//! - A route table with exact static lookup and ordered dynamic matching
//! - Controller, closure and static method handlers with declared parameters
//! - Route groups, resources, subdomains and named routes
//! - Model binding, a prioritized middleware pipeline, rate limiting and CORS
//! - A persisted route cache
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_dispatch::{Handler, Request, Response, Router};
//!
//! let router = Router::builder()
//!     .get("/", Handler::closure(|_| Ok(Response::text("Hello, World!"))))
//!     .named_route(
//!         "users.show",
//!         Method::Get,
//!         "/users/:num",
//!         Handler::closure(|args| Ok(Response::text(format!("user {}", args.str("num").unwrap_or("?"))))),
//!     )
//!     .build()?;
//!
//! let response = router.handle(Request::get("/users/42"));
//! assert_eq!(response.body_string().as_deref(), Some("user 42"));
//! ```
//!
//! ## Patterns
//!
//! Placeholders take their regex from the placeholder registry (`num`,
//! `alpha`, `alnum`, `slug`, `any`, `all`, plus anything registered with
//! [`RouterBuilder::pattern`]). Unknown names match one path segment.
//!
//! ```ignore
//! builder
//!     .pattern("year", "[0-9]{4}")
//!     .get("/archive/:year/:slug", archive)
//!     .get("/files/([a-z]+)\\.txt", file)
//! ```
//!
//! ## Controllers
//!
//! ```ignore
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn construct() -> Result<Self, String> { Ok(Self) }
//!
//!     fn parameters(action: &str) -> Option<Vec<Parameter>> {
//!         match action {
//!             "show" => Some(vec![Parameter::new("id")]),
//!             _ => None,
//!         }
//!     }
//!
//!     fn call(&mut self, _action: &str, args: &Args) -> oxide_dispatch::Result<Response> {
//!         Ok(Response::text(format!("user {}", args.str("id").unwrap_or("?"))))
//!     }
//! }
//!
//! builder.get("/users/:id", Handler::controller::<UserController>("show"))
//! ```
//!
//! ## Route Cache
//!
//! ```ignore
//! let cache = RouteCache::new("var/cache/routes.json");
//! let router = Router::builder()
//!     .register_controller::<UserController>()
//!     .build_cached(&cache, |routes| routes.resource::<UserController>("/users", None))?;
//! ```

pub mod binder;
pub mod config;
pub mod cors;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod params;
pub mod pattern;
pub mod rate_limit;
mod request;
mod response;
pub mod router;
pub mod table;

pub use binder::ModelBinder;
pub use config::{Environment, RouterConfig};
pub use cors::{CorsNegotiator, CorsOptions};
pub use dispatch::{ErrorSink, TracingSink};
pub use error::{Result, RouterError};
pub use handler::{Args, Controller, Handler, HandlerRef, HandlerRegistry, Parameter};
pub use middleware::{LoggingMiddleware, Middleware, Next};
pub use params::{Params, Value};
pub use pattern::{Matcher, PlaceholderRegistry};
pub use rate_limit::{
    Clock, FileStore, ManualClock, MemoryStore, RateLimitStore, RateLimiter, SystemClock,
};
pub use request::{Method, Request};
pub use response::Response;
pub use router::{GroupAttributes, RouteDef, Router, RouterBuilder};
pub use table::{CachedTable, Route, RouteCache, RouteTable};

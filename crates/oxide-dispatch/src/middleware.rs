//! Middleware support for request processing.
//!
//! Middleware wraps the route handler like the layers of an onion: the
//! first middleware in a chain runs first and sees the response last.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::error::Result;
use crate::params::Params;
use crate::request::Request;
use crate::response::Response;

/// Priority of global middleware registered without one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Trait for middleware that intercepts requests.
///
/// A middleware either continues with `next.run(params)` (possibly
/// adjusting the parameters or the response it returns) or short-circuits
/// by returning its own response without calling `next`.
///
/// # Example
///
/// ```ignore
/// struct RequireJson;
///
/// impl Middleware for RequireJson {
///     fn handle(&self, req: &Request, params: Params, next: Next<'_>) -> Result<Response> {
///         if req.get_header("Accept") == Some("application/json") {
///             next.run(params)
///         } else {
///             Ok(Response::error(406, "Not Acceptable"))
///         }
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Handles the request.
    fn handle(&self, request: &Request, params: Params, next: Next<'_>) -> Result<Response>;
}

/// The rest of a middleware chain, ending in the route handler.
pub struct Next<'a> {
    request: &'a Request,
    chain: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Fn(Params) -> Result<Response>,
}

impl Next<'_> {
    /// Runs the remaining middleware and the handler.
    pub fn run(self, params: Params) -> Result<Response> {
        match self.chain.split_first() {
            Some((middleware, rest)) => middleware.handle(
                self.request,
                params,
                Next {
                    request: self.request,
                    chain: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => (self.endpoint)(params),
        }
    }
}

/// Runs `chain` around `endpoint`.
pub fn run(
    chain: &[Arc<dyn Middleware>],
    request: &Request,
    params: Params,
    endpoint: &dyn Fn(Params) -> Result<Response>,
) -> Result<Response> {
    Next {
        request,
        chain,
        endpoint,
    }
    .run(params)
}

/// Middleware built from a closure.
pub struct FnMiddleware<F>(F);

/// Creates middleware from a closure.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&Request, Params, Next<'_>) -> Result<Response> + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&Request, Params, Next<'_>) -> Result<Response> + Send + Sync,
{
    fn handle(&self, request: &Request, params: Params, next: Next<'_>) -> Result<Response> {
        (self.0)(request, params, next)
    }
}

/// A global middleware with its optional priority.
#[derive(Clone)]
pub struct MiddlewareBinding {
    pub middleware: Arc<dyn Middleware>,
    pub priority: Option<i32>,
}

impl fmt::Debug for MiddlewareBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareBinding")
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Orders global middleware: higher priority first, registration order
/// among equal priorities.
pub fn sort_bindings(bindings: &[MiddlewareBinding]) -> Vec<Arc<dyn Middleware>> {
    let mut sorted = bindings.to_vec();
    sorted.sort_by_key(|b| Reverse(b.priority.unwrap_or(DEFAULT_PRIORITY)));
    sorted.into_iter().map(|b| b.middleware).collect()
}

/// Middleware that logs requests.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle(&self, request: &Request, params: Params, next: Next<'_>) -> Result<Response> {
        let started = Instant::now();
        info!(method = %request.method, path = %request.path, "-->");
        let result = next.run(params);
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(res) => info!(status = res.status, elapsed_ms, "<--"),
            Err(e) => info!(status = e.status(), elapsed_ms, error = %e, "<--"),
        }
        result
    }
}

//! Request dispatch.
//!
//! A request passes through CORS preflight, method override, rate limiting,
//! route lookup, model binding and the middleware pipeline before reaching
//! its handler. Any failure along the way is turned into a response here;
//! `dispatch` itself never fails.

use std::backtrace::Backtrace;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{Result, RouterError};
use crate::middleware::{self, Middleware};
use crate::params::Params;
use crate::pattern;
use crate::request::{Method, Request};
use crate::response::Response;
use crate::router::Router;

/// Form field that overrides the method of a POST request.
pub const METHOD_FIELD: &str = "_method";

/// Header that overrides the method of a POST request.
pub const METHOD_HEADER: &str = "X-HTTP-Method-Override";

/// Receives unexpected (5xx) failures.
pub trait ErrorSink: Send + Sync {
    /// Reports a failure with a backtrace captured where the dispatcher
    /// turned it into a response. The frames show the dispatch site, not
    /// where the handler produced the error.
    fn report(&self, request: &Request, error: &RouterError, backtrace: &Backtrace);
}

/// Reports failures through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, request: &Request, error: &RouterError, backtrace: &Backtrace) {
        error!(
            method = %request.method,
            path = %request.path,
            error = %error,
            backtrace = %backtrace,
            "request failed"
        );
    }
}

impl Router {
    /// Dispatches a request, optionally overriding its method and URI.
    pub fn dispatch(&self, request: Request, method: Option<Method>, uri: Option<&str>) -> Response {
        let mut request = request;
        if let Some(method) = method {
            request.method = method;
        }
        if let Some(uri) = uri {
            let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
            request.path = path.to_string();
            request.query = Request::parse_query_string(query);
        }
        request.path = pattern::normalize(&request.path);

        if let Some(cors) = &self.cors {
            if request.method == Method::Options {
                debug!(path = %request.path, "CORS preflight");
                return cors.preflight(&request);
            }
        }

        if self.config.method_override {
            apply_method_override(&mut request);
        }

        let response = self
            .route(&request)
            .unwrap_or_else(|e| self.render_error(&request, e));

        match &self.cors {
            Some(cors) => cors.apply(&request, response),
            None => response,
        }
    }

    /// Dispatches a request as-is.
    pub fn handle(&self, request: Request) -> Response {
        self.dispatch(request, None, None)
    }

    fn route(&self, request: &Request) -> Result<Response> {
        self.check_rate_limits(request)?;

        let host = request.host_name();
        let (route, params) = self
            .table
            .find(request.method, &request.path, host.as_deref())
            .ok_or_else(|| RouterError::RouteNotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            })?;
        debug!(
            method = %request.method,
            path = %request.path,
            handler = %route.handler.reference(),
            "route matched"
        );

        let params = self.binder.apply(params)?;

        let chain: Vec<Arc<dyn Middleware>> = self
            .global
            .iter()
            .cloned()
            .chain(route.middleware.iter().filter_map(|alias| self.aliases.get(alias).cloned()))
            .collect();
        let endpoint = |params: Params| route.handler.invoke(request, params);
        middleware::run(&chain, request, params, &endpoint)
    }

    fn check_rate_limits(&self, request: &Request) -> Result<()> {
        let client = request.client_identity();
        for rule in &self.limits {
            if rule.matcher.matches(&request.path).is_none() {
                continue;
            }
            let key = rule.key(&client);
            match self.limiter.attempt(&key, rule.max_attempts, rule.window) {
                Ok(true) => {}
                Ok(false) => return Err(RouterError::RateLimitExceeded { key }),
                Err(e) => warn!(key = %key, error = %e, "rate limit check failed, allowing request"),
            }
        }
        Ok(())
    }

    fn render_error(&self, request: &Request, error: RouterError) -> Response {
        let status = error.status();
        if error.is_client_error() {
            debug!(status, error = %error, "request rejected");
        } else {
            self.sink.report(request, &error, &Backtrace::force_capture());
        }

        if status == 404 {
            if let Some(not_found) = &self.not_found {
                return not_found(request);
            }
        }
        if let Some(handler) = self.error_handlers.get(&status) {
            return handler(request, &error);
        }

        match &error {
            RouterError::RouteNotFound { .. } => Response::not_found(),
            RouterError::RateLimitExceeded { .. } => Response::too_many_requests(),
            _ if status >= 500 && self.config.environment.is_production() => {
                Response::internal_server_error().status(status)
            }
            _ => Response::error(status, error.to_string()),
        }
    }
}

/// Replaces the method of a POST request with the one it asks for.
fn apply_method_override(request: &mut Request) {
    if request.method != Method::Post {
        return;
    }
    let requested = request
        .form_field(METHOD_FIELD)
        .or_else(|| request.get_header(METHOD_HEADER).map(str::to_string));
    if let Some(method) = requested.as_deref().and_then(Method::from_str) {
        debug!(from = %request.method, to = %method, "method override");
        request.method = method;
    }
}

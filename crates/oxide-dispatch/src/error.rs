//! Error types for routing and dispatch.

use thiserror::Error;

/// Router-specific errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No route matched the request.
    #[error("no route matched: {method} {path}")]
    RouteNotFound { method: String, path: String },

    /// The client exhausted the attempts allowed for a rate-limited pattern.
    #[error("rate limit exceeded for {key}")]
    RateLimitExceeded { key: String },

    /// URL generation was requested for an unknown route name.
    #[error("named route not found: {0}")]
    NamedRouteNotFound(String),

    /// URL generation could not fill a placeholder of the route template.
    #[error("missing value for parameter '{param}' of route '{route}'")]
    UrlParameterMissing { route: String, param: String },

    /// Invalid path pattern.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A handler reference does not resolve to a callable target.
    #[error("invalid handler configuration: {0}")]
    InvalidHandler(String),

    /// A middleware alias was used without being registered.
    #[error("unknown middleware alias: {0}")]
    UnknownMiddleware(String),

    /// A closure route was asked to be written to the route cache.
    #[error("route '{0}' uses a closure handler and cannot be cached")]
    UncacheableRoute(String),

    /// A required handler parameter could not be satisfied.
    #[error("handler '{handler}' is missing required parameter '{param}'")]
    MissingParameter { handler: String, param: String },

    /// The controller for a route could not be constructed.
    #[error("failed to instantiate controller '{controller}': {reason}")]
    ControllerInstantiation { controller: String, reason: String },

    /// A model binder found no domain value for a parameter.
    #[error("no model found for parameter '{param}' with value '{value}'")]
    ModelNotFound { param: String, value: String },

    /// A handler or middleware aborted with an explicit HTTP status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A handler failed.
    #[error("handler error: {0}")]
    Handler(String),

    /// The rate-limit store failed.
    #[error("rate limit storage error: {0}")]
    Storage(String),

    /// IO error while reading or writing persisted state.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RouterError {
    /// Creates an error that aborts the request with the given status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status this error is answered with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::RouteNotFound { .. } | Self::ModelNotFound { .. } => 404,
            Self::RateLimitExceeded { .. } => 429,
            Self::Http { status, .. } => *status,
            _ => 500,
        }
    }

    /// Returns true for errors that are part of normal request flow rather
    /// than a failure worth reporting.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }
}

/// Result type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = RouterError::RouteNotFound {
            method: "GET".to_string(),
            path: "/missing".to_string(),
        };
        assert_eq!(not_found.status(), 404);
        assert!(not_found.is_client_error());

        let limited = RouterError::RateLimitExceeded {
            key: "127.0.0.1|/login".to_string(),
        };
        assert_eq!(limited.status(), 429);

        let missing = RouterError::MissingParameter {
            handler: "UserController::show".to_string(),
            param: "id".to_string(),
        };
        assert_eq!(missing.status(), 500);
        assert!(!missing.is_client_error());

        assert_eq!(RouterError::http(403, "nope").status(), 403);
    }

    #[test]
    fn test_display() {
        let err = RouterError::NamedRouteNotFound("users.show".to_string());
        assert_eq!(err.to_string(), "named route not found: users.show");
    }
}

//! Cross-origin resource sharing.

use serde::Deserialize;

use crate::request::Request;
use crate::response::Response;

/// CORS settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    /// Origins echoed back when a request comes from them. `*` echoes any.
    pub allowed_origins: Vec<String>,
    /// `Access-Control-Allow-Origin` for requests from other origins.
    pub default_origin: String,
    /// Allowed methods.
    pub allowed_methods: Vec<String>,
    /// Allowed headers. `*` echoes the headers a preflight asks for.
    pub allowed_headers: Vec<String>,
    /// Whether credentials are allowed.
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds.
    pub max_age: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            default_origin: "*".to_string(),
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
            max_age: 86400,
        }
    }
}

impl CorsOptions {
    /// Creates options that accept the given origins.
    pub fn new(origins: &[&str]) -> Self {
        Self {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Sets the allowed headers.
    #[must_use]
    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Allows credentials.
    #[must_use]
    pub fn credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache lifetime.
    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = seconds;
        self
    }
}

/// Computes CORS headers for requests.
#[derive(Debug, Clone)]
pub struct CorsNegotiator {
    options: CorsOptions,
}

impl CorsNegotiator {
    /// Creates a negotiator.
    pub fn new(options: CorsOptions) -> Self {
        Self { options }
    }

    /// Returns the configured options.
    pub fn options(&self) -> &CorsOptions {
        &self.options
    }

    fn origin_for(&self, request: &Request) -> (String, bool) {
        match request.get_header("Origin") {
            Some(origin)
                if self
                    .options
                    .allowed_origins
                    .iter()
                    .any(|allowed| allowed == "*" || allowed == origin) =>
            {
                (origin.to_string(), true)
            }
            _ => (self.options.default_origin.clone(), false),
        }
    }

    /// Computes the CORS headers for a request.
    pub fn headers(&self, request: &Request) -> Vec<(String, String)> {
        let (origin, echoed) = self.origin_for(request);

        let allow_headers = if self.options.allowed_headers.iter().any(|h| h == "*") {
            request
                .get_header("Access-Control-Request-Headers")
                .map_or_else(|| "*".to_string(), str::to_string)
        } else {
            self.options.allowed_headers.join(", ")
        };

        let mut headers = vec![
            ("Access-Control-Allow-Origin".to_string(), origin),
            (
                "Access-Control-Allow-Methods".to_string(),
                self.options.allowed_methods.join(", "),
            ),
            ("Access-Control-Allow-Headers".to_string(), allow_headers),
            (
                "Access-Control-Allow-Credentials".to_string(),
                self.options.allow_credentials.to_string(),
            ),
            (
                "Access-Control-Max-Age".to_string(),
                self.options.max_age.to_string(),
            ),
        ];
        if echoed {
            headers.push(("Vary".to_string(), "Origin".to_string()));
        }
        headers
    }

    /// Answers a preflight request.
    pub fn preflight(&self, request: &Request) -> Response {
        self.apply(request, Response::ok())
    }

    /// Adds CORS headers to a response, keeping any it already sets.
    pub fn apply(&self, request: &Request, response: Response) -> Response {
        response.headers_if_absent(self.headers(request))
    }
}

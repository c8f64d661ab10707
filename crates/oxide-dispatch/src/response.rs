//! HTTP response type.

use std::collections::HashMap;

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a response with JSON content.
    pub fn json<T: serde::Serialize>(data: &T) -> Self {
        match serde_json::to_vec(data) {
            Ok(body) => Self::ok()
                .header("Content-Type", "application/json")
                .body(body),
            Err(_) => Self::internal_server_error(),
        }
    }

    /// Creates a response with plain text content.
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok()
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body.into())
    }

    /// Creates a redirect response.
    pub fn redirect(url: impl Into<String>) -> Self {
        Self::new(302).header("Location", url)
    }

    /// Creates a plain-text error response with the given status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::text(message).status(status)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::error(404, "Not Found")
    }

    /// Creates a 429 Too Many Requests response.
    pub fn too_many_requests() -> Self {
        Self::error(429, "Too Many Requests")
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_server_error() -> Self {
        Self::error(500, "Internal Server Error")
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets several headers, keeping ones the response already carries.
    #[must_use]
    pub fn headers_if_absent(mut self, headers: Vec<(String, String)>) -> Self {
        for (key, value) in headers {
            self.headers.entry(key).or_insert(value);
        }
        self
    }

    /// Sets the status code.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_json() {
        let data = serde_json::json!({"name": "test"});
        let res = Response::json(&data);
        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("content-type"), Some("application/json"));
        assert_eq!(res.body_string(), Some(r#"{"name":"test"}"#.to_string()));
    }

    #[test]
    fn test_response_redirect() {
        let res = Response::redirect("/login");
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("Location"), Some("/login"));
    }

    #[test]
    fn test_error_responses() {
        assert_eq!(Response::too_many_requests().status, 429);
        assert_eq!(Response::too_many_requests().status_text(), "Too Many Requests");
        assert_eq!(
            Response::not_found().body_string(),
            Some("Not Found".to_string())
        );
    }

    #[test]
    fn test_headers_if_absent() {
        let res = Response::ok()
            .header("Access-Control-Allow-Origin", "https://a.test")
            .headers_if_absent(vec![
                (
                    "Access-Control-Allow-Origin".to_string(),
                    "*".to_string(),
                ),
                ("Access-Control-Max-Age".to_string(), "60".to_string()),
            ]);
        assert_eq!(
            res.get_header("Access-Control-Allow-Origin"),
            Some("https://a.test")
        );
        assert_eq!(res.get_header("Access-Control-Max-Age"), Some("60"));
    }
}

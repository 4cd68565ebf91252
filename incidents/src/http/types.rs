//! HTTP request and response values.
//!
//! These are deliberately independent of any HTTP client library so that a
//! session can be replaced by a scripted one in tests.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Request methods used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Head,
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Head => "HEAD",
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpStatus(pub u16);

impl HttpStatus {
    pub const OK: HttpStatus = HttpStatus(200);
    pub const CREATED: HttpStatus = HttpStatus(201);
    pub const NO_CONTENT: HttpStatus = HttpStatus(204);
    pub const NOT_MODIFIED: HttpStatus = HttpStatus(304);
    pub const BAD_REQUEST: HttpStatus = HttpStatus(400);
    pub const UNAUTHORIZED: HttpStatus = HttpStatus(401);
    pub const FORBIDDEN: HttpStatus = HttpStatus(403);
    pub const NOT_FOUND: HttpStatus = HttpStatus(404);
    pub const CONFLICT: HttpStatus = HttpStatus(409);
    pub const PRECONDITION_FAILED: HttpStatus = HttpStatus(412);
    pub const INTERNAL_SERVER_ERROR: HttpStatus = HttpStatus(500);
    pub const SERVICE_UNAVAILABLE: HttpStatus = HttpStatus(503);

    pub fn code(self) -> u16 {
        self.0
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Standard reason phrase, or `"(unknown)"`.
    pub fn reason(self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            412 => "Precondition Failed",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            422 => "Unprocessable Entity",
            428 => "Precondition Required",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "(unknown)",
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// Case-insensitive, multi-valued header map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    storage: BTreeMap<String, Vec<String>>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// All values for a header.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.storage
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    /// The first value for a header.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.storage.contains_key(&name.to_ascii_lowercase())
    }

    /// Replace all values for a header with one value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.storage
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    /// Append a value to a header.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.storage
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Append every value of another header map.
    pub fn extend(&mut self, other: &HttpHeaders) {
        for (name, values) in other.iter() {
            for value in values {
                self.add(name, value.clone());
            }
        }
    }

    /// Iterate over `(lowercased name, values)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.storage
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Bytes,
}

impl HttpRequest {
    /// A request with no headers and an empty body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HttpHeaders::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// A received response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: HttpStatus,
    pub headers: HttpHeaders,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: HttpStatus) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HttpHeaders::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "application/json");
        assert_eq!(headers.first("content-type"), Some("application/json"));
        assert_eq!(headers.first("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn test_headers_multi_valued() {
        let mut headers = HttpHeaders::new();
        headers.add("Accept", "text/plain");
        headers.add("accept", "application/json");
        assert_eq!(
            headers.get("Accept").unwrap(),
            &["text/plain".to_string(), "application/json".to_string()]
        );

        headers.set("ACCEPT", "*/*");
        assert_eq!(headers.get("accept").unwrap(), &["*/*".to_string()]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_extend() {
        let mut a = HttpHeaders::new();
        a.add("X-One", "1");
        let mut b = HttpHeaders::new();
        b.add("x-one", "2");
        b.add("X-Two", "2");
        a.extend(&b);
        assert_eq!(a.get("x-one").unwrap().len(), 2);
        assert_eq!(a.first("x-two"), Some("2"));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(HttpStatus::OK.to_string(), "200 OK");
        assert_eq!(HttpStatus(599).to_string(), "599 (unknown)");
        assert!(HttpStatus::NO_CONTENT.is_success());
        assert!(!HttpStatus::NOT_MODIFIED.is_success());
    }

    #[test]
    fn test_request_builders() {
        let request = HttpRequest::post("http://localhost/ping/", "{}")
            .with_header("Accept", "application/json");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Bytes::from_static(b"{}"));
        assert_eq!(request.headers.first("accept"), Some("application/json"));
    }
}

//! JSON request/response adapter over an [`HttpSession`].
//!
//! Every request is sent with JSON content negotiation headers, and every
//! response is classified before the caller sees it:
//!
//! 1. An authentication challenge header wins over everything else.
//! 2. `200`/`201` carry an optional JSON document.
//! 3. `204` carries nothing.
//! 4. Any other status is an error.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::{HttpConnection, HttpSession, TransportError};
use super::types::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatus};

/// MIME type for JSON documents.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Header the server sets when the request needs credentials.
///
/// Its value is the authentication realm, which may be empty.
pub const AUTHENTICATION_REQUIRED_HEADER: &str = "X-IMS-Authentication-Required";

/// Errors from a JSON exchange.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JsonError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Authentication required{}", realm_suffix(.realm))]
    AuthenticationRequired { realm: Option<String> },

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: HttpStatus, url: String },

    #[error("Expected JSON content from {url}, got {content_type:?}")]
    UnexpectedContentType {
        url: String,
        content_type: Option<String>,
    },

    #[error("Invalid JSON from {url}: {reason}")]
    InvalidJson { url: String, reason: String },
}

fn realm_suffix(realm: &Option<String>) -> String {
    realm
        .as_deref()
        .map(|realm| format!(" for realm {}", realm))
        .unwrap_or_default()
}

impl JsonError {
    /// True for failures that mean the server could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// A classified JSON response.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub url: String,
    pub status: HttpStatus,
    pub headers: HttpHeaders,
    pub json: Option<Value>,
}

/// Receives the outcome of a JSON exchange.
pub type JsonHandler = Box<dyn FnOnce(Result<JsonResponse, JsonError>) + Send + 'static>;

/// Sends JSON requests through a shared [`HttpSession`].
#[derive(Clone)]
pub struct JsonSession {
    session: Arc<dyn HttpSession>,
}

impl JsonSession {
    pub fn new(session: Arc<dyn HttpSession>) -> Self {
        Self { session }
    }

    /// The underlying HTTP session.
    pub fn session(&self) -> &Arc<dyn HttpSession> {
        &self.session
    }

    /// Cancel all requests made through this session.
    pub fn invalidate(&self) {
        self.session.invalidate();
    }

    /// `GET` a JSON document.
    pub fn get(&self, url: &str, handler: JsonHandler) -> Result<HttpConnection, TransportError> {
        self.send(HttpMethod::Get, url, None, handler)
    }

    /// `POST` a JSON document.
    pub fn post(
        &self,
        url: &str,
        body: &Value,
        handler: JsonHandler,
    ) -> Result<HttpConnection, TransportError> {
        self.send(HttpMethod::Post, url, Some(body), handler)
    }

    /// Send a request with an optional JSON body.
    pub fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&Value>,
        handler: JsonHandler,
    ) -> Result<HttpConnection, TransportError> {
        let mut request = HttpRequest::new(method, url).with_header("Accept", JSON_CONTENT_TYPE);

        if let Some(body) = body {
            request = request
                .with_header("Content-Type", JSON_CONTENT_TYPE)
                .with_body(body.to_string());
        }

        debug!(%method, url, "JSON request");

        self.session.send(
            request,
            Box::new(move |result: Result<HttpResponse, TransportError>| {
                handler(result.map_err(JsonError::from).and_then(interpret))
            }),
        )
    }
}

/// Classify an HTTP response.
pub fn interpret(response: HttpResponse) -> Result<JsonResponse, JsonError> {
    if let Some(values) = response.headers.get(AUTHENTICATION_REQUIRED_HEADER) {
        let realm = values
            .first()
            .map(|realm| realm.trim())
            .filter(|realm| !realm.is_empty())
            .map(str::to_string);
        return Err(JsonError::AuthenticationRequired { realm });
    }

    let json = match response.status {
        HttpStatus::OK | HttpStatus::CREATED => parse_body(&response)?,
        HttpStatus::NO_CONTENT => None,
        status => {
            warn!(%status, url = %response.url, "Unexpected HTTP status");
            return Err(JsonError::UnexpectedStatus {
                status,
                url: response.url,
            });
        }
    };

    Ok(JsonResponse {
        url: response.url,
        status: response.status,
        headers: response.headers,
        json,
    })
}

fn parse_body(response: &HttpResponse) -> Result<Option<Value>, JsonError> {
    if response.body.is_empty() {
        return Ok(None);
    }

    let content_type = response.headers.first("Content-Type");
    if !content_type.is_some_and(is_json_content_type) {
        return Err(JsonError::UnexpectedContentType {
            url: response.url.clone(),
            content_type: content_type.map(str::to_string),
        });
    }

    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(|e| JsonError::InvalidJson {
            url: response.url.clone(),
            reason: e.to_string(),
        })
}

/// True for `application/json`, ignoring case and parameters.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|media| media.eq_ignore_ascii_case(JSON_CONTENT_TYPE))
}

//! HTTP transport.
//!
//! - [`types`]: request, response, header and status values
//! - [`session`]: the [`HttpSession`] abstraction and its reqwest implementation
//! - [`json`]: JSON content negotiation and response classification

pub mod json;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use json::{
    interpret, is_json_content_type, JsonError, JsonHandler, JsonResponse, JsonSession,
    AUTHENTICATION_REQUIRED_HEADER, JSON_CONTENT_TYPE,
};
pub use session::{
    ConnectionSignals, HttpConnection, HttpSession, ReqwestSession, ReqwestSessionFactory,
    ResponseHandler, SessionConfig, SessionFactory, TransportError, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_TIMEOUT,
};
pub use types::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatus};

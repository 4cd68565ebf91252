//! Scriptable HTTP session for tests.
//!
//! Requests are parked until a test answers them with [`MockSession::respond`]
//! or [`MockSession::fail`]. Handlers run on the test's thread, outside any
//! lock held by the mock.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::json::{AUTHENTICATION_REQUIRED_HEADER, JSON_CONTENT_TYPE};
use super::session::{
    ConnectionSignals, HttpConnection, HttpSession, ResponseHandler, SessionFactory,
    TransportError,
};
use super::types::{HttpMethod, HttpRequest, HttpResponse, HttpStatus};

struct Pending {
    request: HttpRequest,
    handler: ResponseHandler,
    signals: ConnectionSignals,
}

#[derive(Default)]
struct MockState {
    sent: Vec<HttpRequest>,
    pending: Vec<Pending>,
    invalidated: bool,
}

/// Session whose responses are supplied by the test.
#[derive(Default)]
pub struct MockSession {
    state: Mutex<MockState>,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every request ever sent, oldest first.
    pub fn sent(&self) -> Vec<HttpRequest> {
        self.state.lock().sent.clone()
    }

    /// `(method, url)` of every request ever sent.
    pub fn sent_urls(&self) -> Vec<(HttpMethod, String)> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|r| (r.method, r.url.clone()))
            .collect()
    }

    /// URLs of unanswered, uncancelled requests.
    pub fn pending_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .pending
            .iter()
            .filter(|p| !p.signals.is_cancelled())
            .map(|p| p.request.url.clone())
            .collect()
    }

    pub fn is_invalidated(&self) -> bool {
        self.state.lock().invalidated
    }

    fn take(&self, url_suffix: &str) -> Option<Pending> {
        let mut state = self.state.lock();
        let index = state
            .pending
            .iter()
            .position(|p| p.request.url.ends_with(url_suffix))?;
        Some(state.pending.remove(index))
    }

    /// Answer the oldest pending request whose URL ends with `url_suffix`.
    ///
    /// Returns false if no such request is pending. A cancelled request is
    /// consumed without invoking its handler.
    pub fn respond(&self, url_suffix: &str, response: HttpResponse) -> bool {
        match self.take(url_suffix) {
            Some(pending) => {
                if !pending.signals.is_cancelled() {
                    (pending.handler)(Ok(response));
                }
                true
            }
            None => false,
        }
    }

    /// Fail the oldest pending request whose URL ends with `url_suffix`.
    pub fn fail(&self, url_suffix: &str, error: TransportError) -> bool {
        match self.take(url_suffix) {
            Some(pending) => {
                if !pending.signals.is_cancelled() {
                    (pending.handler)(Err(error));
                }
                true
            }
            None => false,
        }
    }

    /// Answer with a JSON document.
    pub fn respond_json(&self, url_suffix: &str, json: Value) -> bool {
        self.respond(url_suffix, json_response(url_suffix, HttpStatus::OK, &json))
    }

    /// Answer with a JSON document and an `ETag` header.
    pub fn respond_json_with_etag(&self, url_suffix: &str, json: Value, etag: &str) -> bool {
        self.respond(
            url_suffix,
            json_response(url_suffix, HttpStatus::OK, &json).with_header("ETag", etag),
        )
    }

    /// Answer with a bare status code.
    pub fn respond_status(&self, url_suffix: &str, status: HttpStatus) -> bool {
        self.respond(url_suffix, HttpResponse::new(url_suffix, status))
    }

    /// Answer with an authentication challenge.
    pub fn respond_auth_required(&self, url_suffix: &str, realm: &str) -> bool {
        self.respond(
            url_suffix,
            HttpResponse::new(url_suffix, HttpStatus::UNAUTHORIZED)
                .with_header(AUTHENTICATION_REQUIRED_HEADER, realm),
        )
    }
}

/// A `200` response carrying `json`.
pub fn json_response(url: &str, status: HttpStatus, json: &Value) -> HttpResponse {
    HttpResponse::new(url, status)
        .with_header("Content-Type", JSON_CONTENT_TYPE)
        .with_body(json.to_string())
}

impl HttpSession for MockSession {
    fn send(
        &self,
        request: HttpRequest,
        handler: ResponseHandler,
    ) -> Result<HttpConnection, TransportError> {
        let mut state = self.state.lock();
        if state.invalidated {
            return Err(TransportError::Invalidated);
        }

        let (connection, signals) = HttpConnection::new();
        state.sent.push(request.clone());
        state.pending.push(Pending {
            request,
            handler,
            signals,
        });
        Ok(connection)
    }

    /// Refuse new requests.
    ///
    /// Pending requests stay answerable so tests can deliver responses that
    /// were already in flight when the session was abandoned.
    fn invalidate(&self) {
        self.state.lock().invalidated = true;
    }
}

/// Hands out a new [`MockSession`] per connection attempt and remembers them.
#[derive(Default)]
pub struct MockSessionFactory {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    failing: Mutex<Option<TransportError>>,
}

impl MockSessionFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every session created, oldest first.
    pub fn sessions(&self) -> Vec<Arc<MockSession>> {
        self.sessions.lock().clone()
    }

    /// The most recently created session.
    pub fn current(&self) -> Arc<MockSession> {
        self.sessions
            .lock()
            .last()
            .cloned()
            .expect("no session has been created")
    }

    /// Make every future `create_session` call fail.
    pub fn fail_with(&self, error: TransportError) {
        *self.failing.lock() = Some(error);
    }
}

impl SessionFactory for MockSessionFactory {
    fn create_session(&self) -> Result<Arc<dyn HttpSession>, TransportError> {
        if let Some(error) = self.failing.lock().clone() {
            return Err(error);
        }
        let session = MockSession::new();
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_respond_invokes_handler_once() {
        let session = MockSession::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        session
            .send(
                HttpRequest::get("http://host/a/"),
                Box::new(move |result: Result<HttpResponse, TransportError>| {
                    assert_eq!(result.unwrap().status, HttpStatus::NO_CONTENT);
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(session.pending_urls(), vec!["http://host/a/".to_string()]);
        assert!(session.respond_status("/a/", HttpStatus::NO_CONTENT));
        assert!(!session.respond_status("/a/", HttpStatus::NO_CONTENT));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_request_never_fires() {
        let session = MockSession::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let connection = session
            .send(
                HttpRequest::get("http://host/a/"),
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        connection.cancel();

        assert!(session.pending_urls().is_empty());
        assert!(session.respond_status("/a/", HttpStatus::OK));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalidate_refuses_new_requests() {
        let session = MockSession::new();
        session
            .send(HttpRequest::get("http://host/a/"), Box::new(|_| {}))
            .unwrap();
        session.invalidate();

        assert!(session.is_invalidated());
        assert_eq!(session.pending_urls().len(), 1);
        assert!(session
            .send(HttpRequest::get("http://host/b/"), Box::new(|_| {}))
            .is_err());
    }
}

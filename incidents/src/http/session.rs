//! HTTP sessions and in-flight connections.
//!
//! A session issues requests asynchronously and reports each outcome exactly
//! once through a completion handler. The returned [`HttpConnection`] lets
//! the caller cancel, pause or resume the transfer.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::types::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpStatus};

/// Default idle timeout between received bytes.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default absolute timeout for a whole request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Errors raised while moving bytes, before any HTTP status is known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Session has been invalidated")]
    Invalidated,

    #[error("Failed to create HTTP session: {0}")]
    SessionSetup(String),
}

/// Receives the single outcome of a request.
///
/// Being `FnOnce`, a handler can fire at most once. A cancelled request
/// never fires its handler.
pub type ResponseHandler = Box<dyn FnOnce(Result<HttpResponse, TransportError>) + Send + 'static>;

/// A client that performs HTTP requests.
///
/// Implementations must never invoke the handler from within `send`; the
/// handler runs later, possibly on another thread.
pub trait HttpSession: Send + Sync {
    /// Start a request.
    ///
    /// An error means the request could not be issued at all and the
    /// handler has been dropped.
    fn send(
        &self,
        request: HttpRequest,
        handler: ResponseHandler,
    ) -> Result<HttpConnection, TransportError>;

    /// Cancel every outstanding request and refuse new ones.
    fn invalidate(&self);
}

/// Builds fresh sessions. Called on every connection attempt.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self) -> Result<Arc<dyn HttpSession>, TransportError>;
}

impl<F> SessionFactory for F
where
    F: Fn() -> Result<Arc<dyn HttpSession>, TransportError> + Send + Sync,
{
    fn create_session(&self) -> Result<Arc<dyn HttpSession>, TransportError> {
        self()
    }
}

/// Handle to an in-flight request.
///
/// Dropping the handle does not cancel the request.
#[derive(Debug, Clone)]
pub struct HttpConnection {
    cancellation: CancellationToken,
    paused: Arc<watch::Sender<bool>>,
}

/// The transfer side of an [`HttpConnection`].
#[derive(Debug)]
pub struct ConnectionSignals {
    cancellation: CancellationToken,
    paused: watch::Receiver<bool>,
}

impl HttpConnection {
    /// Create a connection handle and the signals a transfer observes.
    pub fn new() -> (Self, ConnectionSignals) {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Like [`HttpConnection::new`], but cancelled along with `cancellation`.
    pub fn with_cancellation(cancellation: CancellationToken) -> (Self, ConnectionSignals) {
        let (paused_tx, paused_rx) = watch::channel(false);
        let connection = Self {
            cancellation: cancellation.clone(),
            paused: Arc::new(paused_tx),
        };
        let signals = ConnectionSignals {
            cancellation,
            paused: paused_rx,
        };
        (connection, signals)
    }

    /// Abandon the request. Its handler will not be invoked.
    ///
    /// Has no effect once the request has completed.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Suspend the transfer at the next opportunity.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

impl ConnectionSignals {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Completes when the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Wait while the connection is paused.
    pub async fn wait_resumed(&mut self) {
        // A dropped handle can never pause again.
        let _ = self.paused.wait_for(|paused| !*paused).await;
    }
}

/// Settings for [`ReqwestSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: Option<String>,
    pub idle_timeout: Duration,
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`HttpSession`] backed by an async reqwest client on a tokio runtime.
pub struct ReqwestSession {
    client: reqwest::Client,
    runtime: Handle,
    session_token: CancellationToken,
}

impl ReqwestSession {
    /// Create a session on the current tokio runtime.
    pub fn new(config: &SessionConfig) -> Result<Self, TransportError> {
        let runtime = Handle::try_current()
            .map_err(|e| TransportError::SessionSetup(format!("No tokio runtime: {}", e)))?;
        Self::with_runtime(config, runtime)
    }

    /// Create a session that spawns its transfers on `runtime`.
    pub fn with_runtime(config: &SessionConfig, runtime: Handle) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .read_timeout(config.idle_timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::SessionSetup(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            session_token: CancellationToken::new(),
        })
    }
}

impl HttpSession for ReqwestSession {
    fn send(
        &self,
        request: HttpRequest,
        handler: ResponseHandler,
    ) -> Result<HttpConnection, TransportError> {
        if self.session_token.is_cancelled() {
            return Err(TransportError::Invalidated);
        }

        let url = reqwest::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let method = match request.method {
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, url);
        for (name, values) in request.headers.iter() {
            for value in values {
                builder = builder.header(name, value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let (connection, mut signals) =
            HttpConnection::with_cancellation(self.session_token.child_token());
        let request_url = request.url;

        trace!(method = %request.method, url = %request_url, "Sending request");

        self.runtime.spawn(async move {
            let cancellation = signals.cancellation.clone();
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!(url = %request_url, "Request cancelled");
                }
                result = perform(builder, &request_url, &mut signals) => {
                    if !cancellation.is_cancelled() {
                        handler(result);
                    }
                }
            }
        });

        Ok(connection)
    }

    fn invalidate(&self) {
        debug!("Invalidating HTTP session");
        self.session_token.cancel();
    }
}

async fn perform(
    builder: reqwest::RequestBuilder,
    url: &str,
    signals: &mut ConnectionSignals,
) -> Result<HttpResponse, TransportError> {
    signals.wait_resumed().await;

    let mut response = builder.send().await.map_err(|e| map_error(url, e))?;

    let status = HttpStatus(response.status().as_u16());
    let mut headers = HttpHeaders::new();
    for (name, value) in response.headers() {
        match value.to_str() {
            Ok(text) => headers.add(name.as_str(), text),
            Err(_) => trace!(header = %name, "Skipping non-text header value"),
        }
    }
    let final_url = response.url().to_string();

    let mut body = Vec::new();
    loop {
        signals.wait_resumed().await;
        match response.chunk().await.map_err(|e| map_error(url, e))? {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }

    trace!(url = %final_url, %status, bytes = body.len(), "Response received");

    Ok(HttpResponse {
        url: final_url,
        status,
        headers,
        body: body.into(),
    })
}

fn map_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

/// Factory for [`ReqwestSession`]s sharing one configuration and runtime.
pub struct ReqwestSessionFactory {
    config: SessionConfig,
    runtime: Handle,
}

impl ReqwestSessionFactory {
    pub fn new(config: SessionConfig, runtime: Handle) -> Self {
        Self { config, runtime }
    }
}

impl SessionFactory for ReqwestSessionFactory {
    fn create_session(&self) -> Result<Arc<dyn HttpSession>, TransportError> {
        let session = ReqwestSession::with_runtime(&self.config, self.runtime.clone())?;
        Ok(Arc::new(session))
    }
}

//! Response of a tracked request.
//!
//! The body is fetched lazily: [`Response::buffer`] waits until the request
//! finished loading, asks the browser for the body once and caches it.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{OnceCell, watch};

use crate::connection::Channel;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::NetworkCommand;
use crate::protocol::network::{Headers, ResponsePayload, SecurityDetailsPayload};

use super::request::{Request, RequestInner};

// ============================================================================
// Constants
// ============================================================================

const REDIRECT_BODY_UNAVAILABLE: &str = "Response body is unavailable for redirect responses";

// ============================================================================
// BodyState
// ============================================================================

/// Loading state of a request's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BodyState {
    Pending,
    Ready,
    Failed(String),
}

// ============================================================================
// RemoteAddress
// ============================================================================

/// Address of the server that answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    /// IP address.
    pub ip: String,

    /// Port, if reported.
    pub port: Option<u16>,
}

// ============================================================================
// Response
// ============================================================================

struct ResponseInner {
    request: Weak<RequestInner>,
    channel: Arc<dyn Channel>,
    request_id: RequestId,
    url: String,
    status: u16,
    status_text: String,
    headers: Headers,
    from_disk_cache: bool,
    from_service_worker: bool,
    security_details: Option<SecurityDetailsPayload>,
    remote_address: Option<RemoteAddress>,
    body_state: watch::Receiver<BodyState>,
    body: OnceCell<Vec<u8>>,
}

/// HTTP response received for a [`Request`].
#[derive(Clone)]
pub struct Response {
    inner: Arc<ResponseInner>,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("request_id", &self.inner.request_id)
            .field("status", &self.inner.status)
            .field("url", &self.inner.url)
            .finish_non_exhaustive()
    }
}

impl Response {
    /// Response whose body becomes available when `request` finishes.
    pub(crate) fn new(request: &Request, payload: &ResponsePayload) -> Self {
        Self::build(request, payload, request.body_state())
    }

    /// Response of a redirect hop; its body is never available.
    pub(crate) fn redirect(request: &Request, payload: &ResponsePayload) -> Self {
        let (_, body_state) =
            watch::channel(BodyState::Failed(REDIRECT_BODY_UNAVAILABLE.to_string()));
        Self::build(request, payload, body_state)
    }

    fn build(
        request: &Request,
        payload: &ResponsePayload,
        body_state: watch::Receiver<BodyState>,
    ) -> Self {
        let headers = payload
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        let remote_address = payload.remote_ip_address.as_ref().map(|ip| RemoteAddress {
            ip: ip.clone(),
            port: payload.remote_port,
        });

        Self {
            inner: Arc::new(ResponseInner {
                request: request.downgrade(),
                channel: request.channel(),
                request_id: request.request_id().clone(),
                url: payload.url.clone(),
                status: payload.status,
                status_text: payload.status_text.clone(),
                headers,
                from_disk_cache: payload.from_disk_cache,
                from_service_worker: payload.from_service_worker,
                security_details: payload.security_details.clone(),
                remote_address,
                body_state,
                body: OnceCell::new(),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the response URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns the HTTP status code.
    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.inner.status
    }

    /// Returns the HTTP status text.
    #[inline]
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.inner.status_text
    }

    /// Returns `true` for status 0 or 200-299.
    #[inline]
    #[must_use]
    pub fn ok(&self) -> bool {
        self.inner.status == 0 || (200..=299).contains(&self.inner.status)
    }

    /// Returns the headers with lower-cased names.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    /// Returns `true` if served from the disk cache.
    #[inline]
    #[must_use]
    pub fn from_disk_cache(&self) -> bool {
        self.inner.from_disk_cache
    }

    /// Returns `true` if served by a service worker.
    #[inline]
    #[must_use]
    pub fn from_service_worker(&self) -> bool {
        self.inner.from_service_worker
    }

    /// Returns `true` if served from the disk or memory cache.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.inner.from_disk_cache || self.request().is_some_and(|r| r.from_memory_cache())
    }

    /// Returns TLS details for secure responses.
    #[inline]
    #[must_use]
    pub fn security_details(&self) -> Option<&SecurityDetailsPayload> {
        self.inner.security_details.as_ref()
    }

    /// Returns the remote server address.
    #[inline]
    #[must_use]
    pub fn remote_address(&self) -> Option<&RemoteAddress> {
        self.inner.remote_address.as_ref()
    }

    /// Returns the request this response answers, while it is alive.
    #[must_use]
    pub fn request(&self) -> Option<Request> {
        self.inner.request.upgrade().map(Request::from_inner)
    }

    // ========================================================================
    // Body
    // ========================================================================

    /// Returns the response body.
    ///
    /// Waits for the request to finish loading. The body is fetched once and
    /// cached for later calls.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] for redirect responses or failed loads
    /// - any error from `Network.getResponseBody`
    pub async fn buffer(&self) -> Result<Vec<u8>> {
        let body = self
            .inner
            .body
            .get_or_try_init(|| self.fetch_body())
            .await?;
        Ok(body.clone())
    }

    /// Returns the body decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`buffer`](Self::buffer), plus [`Error::Network`] for invalid
    /// UTF-8.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.buffer().await?;
        String::from_utf8(bytes)
            .map_err(|e| Error::network(format!("Response body is not valid UTF-8: {e}")))
    }

    /// Returns the body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Same as [`buffer`](Self::buffer), plus [`Error::Json`] on parse failure.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.buffer().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_body(&self) -> Result<Vec<u8>> {
        let mut body_state = self.inner.body_state.clone();
        let state = body_state
            .wait_for(|state| *state != BodyState::Pending)
            .await
            .map(|state| state.clone())
            .map_err(|_| Error::network("Request was dropped before loading finished"))?;

        if let BodyState::Failed(reason) = state {
            return Err(Error::network(reason));
        }

        let command = NetworkCommand::GetResponseBody {
            request_id: self.inner.request_id.clone(),
        };
        let result = self.inner.channel.execute(command.into()).await?;

        let body = result.get("body").and_then(Value::as_str).unwrap_or_default();
        let base64_encoded = result
            .get("base64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if base64_encoded {
            Base64Standard
                .decode(body)
                .map_err(|e| Error::network(format!("Invalid base64 response body: {e}")))
        } else {
            Ok(body.as_bytes().to_vec())
        }
    }
}

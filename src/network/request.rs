//! Tracked network request.
//!
//! A [`Request`] is created when the manager has seen the direct-feed event
//! for a request (and, with interception on, its matching interception
//! event). It stays live until a terminal event or a redirect closes it out.
//!
//! Interception actions are at-most-once:
//!
//! | Call | Outcome |
//! |------|---------|
//! | first `continue_request` / `fulfill` / `abort` | command sent |
//! | any later action | `Error::Network("Request is already handled")` |
//! | request not paused by interception | `Error::Network("Request interception is not enabled")` |
//! | `data:` URL | no-op |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::connection::Channel;
use crate::error::{Error, Result};
use crate::identifiers::{FrameId, InterceptionId, RequestId};
use crate::protocol::NetworkCommand;
use crate::protocol::network::{ErrorReason, Headers, RequestWillBeSent};

use super::fulfill::FulfillResponse;
use super::response::{BodyState, Response};
use super::types::ContinueOverrides;

// ============================================================================
// RequestInner
// ============================================================================

#[derive(Debug, Default)]
struct RequestState {
    handled: bool,
    response: Option<Response>,
    failure: Option<String>,
    from_memory_cache: bool,
}

pub(crate) struct RequestInner {
    channel: Arc<dyn Channel>,
    request_id: RequestId,
    interception_id: Option<InterceptionId>,
    allow_interception: bool,
    url: String,
    method: String,
    headers: Headers,
    post_data: Option<String>,
    resource_type: String,
    frame_id: Option<FrameId>,
    is_navigation: bool,
    redirect_chain: Vec<Request>,
    state: Mutex<RequestState>,
    body: watch::Sender<BodyState>,
}

// ============================================================================
// Request
// ============================================================================

/// A network request observed through the direct feed.
///
/// Cloning is cheap; clones share state.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.inner.request_id)
            .field("interception_id", &self.inner.interception_id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Request {}

impl Request {
    pub(crate) fn new(
        channel: Arc<dyn Channel>,
        event: &RequestWillBeSent,
        interception_id: Option<InterceptionId>,
        allow_interception: bool,
        redirect_chain: Vec<Request>,
    ) -> Self {
        let resource_type = event
            .resource_type
            .as_deref()
            .unwrap_or("Other")
            .to_ascii_lowercase();

        let is_navigation = resource_type == "document"
            && event
                .loader_id
                .as_ref()
                .is_some_and(|loader| loader.as_str() == event.request_id.as_str());

        let headers = event
            .request
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        let (body, _) = watch::channel(BodyState::Pending);

        Self {
            inner: Arc::new(RequestInner {
                channel,
                request_id: event.request_id.clone(),
                interception_id,
                allow_interception,
                url: event.request.full_url(),
                method: event.request.method.clone(),
                headers,
                post_data: event.request.post_data.clone(),
                resource_type,
                frame_id: event.frame_id.clone(),
                is_navigation,
                redirect_chain,
                state: Mutex::new(RequestState::default()),
                body,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RequestInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<RequestInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn channel(&self) -> Arc<dyn Channel> {
        Arc::clone(&self.inner.channel)
    }

    pub(crate) fn body_state(&self) -> watch::Receiver<BodyState> {
        self.inner.body.subscribe()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the direct-feed request id.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.inner.request_id
    }

    /// Returns the interception id, if the request was paused.
    #[inline]
    #[must_use]
    pub fn interception_id(&self) -> Option<&InterceptionId> {
        self.inner.interception_id.as_ref()
    }

    /// Returns the URL including any fragment.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns the HTTP method.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Returns the headers with lower-cased names.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    /// Returns the post body.
    #[inline]
    #[must_use]
    pub fn post_data(&self) -> Option<&str> {
        self.inner.post_data.as_deref()
    }

    /// Returns the lower-cased resource type (e.g. `"document"`, `"xhr"`).
    #[inline]
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.inner.resource_type
    }

    /// Returns the owning frame.
    #[inline]
    #[must_use]
    pub fn frame_id(&self) -> Option<&FrameId> {
        self.inner.frame_id.as_ref()
    }

    /// Returns `true` for top-level document navigations.
    #[inline]
    #[must_use]
    pub fn is_navigation_request(&self) -> bool {
        self.inner.is_navigation
    }

    /// Returns the earlier hops that redirected to this request, oldest first.
    #[inline]
    #[must_use]
    pub fn redirect_chain(&self) -> &[Request] {
        &self.inner.redirect_chain
    }

    /// Returns the response, once received.
    #[must_use]
    pub fn response(&self) -> Option<Response> {
        self.inner.state.lock().response.clone()
    }

    /// Returns the failure text if the request failed.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.inner.state.lock().failure.clone()
    }

    /// Returns `true` if the request was served from the memory cache.
    #[must_use]
    pub fn from_memory_cache(&self) -> bool {
        self.inner.state.lock().from_memory_cache
    }

    // ========================================================================
    // Lifecycle (driven by the manager)
    // ========================================================================

    pub(crate) fn set_response(&self, response: Response) {
        self.inner.state.lock().response = Some(response);
    }

    pub(crate) fn mark_served_from_cache(&self) {
        self.inner.state.lock().from_memory_cache = true;
    }

    pub(crate) fn finish(&self) {
        self.inner.body.send_replace(BodyState::Ready);
    }

    pub(crate) fn fail(&self, error_text: &str) {
        self.inner.state.lock().failure = Some(error_text.to_string());
        self.inner
            .body
            .send_replace(BodyState::Failed(error_text.to_string()));
    }

    // ========================================================================
    // Interception
    // ========================================================================

    /// Resumes the paused request, optionally modified.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if already handled or not paused
    /// - any error from sending the command
    pub async fn continue_request(&self, overrides: ContinueOverrides) -> Result<()> {
        let Some(interception_id) = self.claim()? else {
            return Ok(());
        };

        let command = NetworkCommand::ContinueInterceptedRequest {
            interception_id,
            error_reason: None,
            raw_response: None,
            url: overrides.url,
            method: overrides.method,
            post_data: overrides.post_data,
            headers: overrides.headers,
            auth_challenge_response: None,
        };
        self.inner.channel.execute(command.into()).await?;
        Ok(())
    }

    /// Answers the paused request with a synthetic response.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if already handled or not paused
    /// - any error from sending the command
    pub async fn fulfill(&self, response: FulfillResponse) -> Result<()> {
        let Some(interception_id) = self.claim()? else {
            return Ok(());
        };

        let command = NetworkCommand::ContinueInterceptedRequest {
            interception_id,
            error_reason: None,
            raw_response: Some(response.to_base64()),
            url: None,
            method: None,
            post_data: None,
            headers: None,
            auth_challenge_response: None,
        };
        self.inner.channel.execute(command.into()).await?;
        Ok(())
    }

    /// Fails the paused request with `reason`.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if already handled or not paused
    /// - any error from sending the command
    pub async fn abort(&self, reason: ErrorReason) -> Result<()> {
        let Some(interception_id) = self.claim()? else {
            return Ok(());
        };

        let command = NetworkCommand::ContinueInterceptedRequest {
            interception_id,
            error_reason: Some(reason),
            raw_response: None,
            url: None,
            method: None,
            post_data: None,
            headers: None,
            auth_challenge_response: None,
        };
        self.inner.channel.execute(command.into()).await?;
        Ok(())
    }

    /// Fails the paused request with a reason given by name.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `reason` is not a known error code
    /// - same as [`abort`](Self::abort)
    pub async fn abort_with(&self, reason: &str) -> Result<()> {
        let reason: ErrorReason = reason.parse()?;
        self.abort(reason).await
    }

    /// Reserves the request for a single interception action.
    fn claim(&self) -> Result<Option<InterceptionId>> {
        if self.inner.url.starts_with("data:") {
            return Ok(None);
        }

        let interception_id = match &self.inner.interception_id {
            Some(id) if self.inner.allow_interception => id.clone(),
            _ => return Err(Error::network("Request interception is not enabled")),
        };

        let mut state = self.inner.state.lock();
        if state.handled {
            return Err(Error::network("Request is already handled"));
        }
        state.handled = true;

        debug!(
            request_id = %self.inner.request_id,
            interception_id = %interception_id,
            "Request claimed for interception"
        );
        Ok(Some(interception_id))
    }
}

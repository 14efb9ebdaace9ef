//! Caller-facing value types for the network manager.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::network::Headers;

use super::request::Request;
use super::response::Response;

// ============================================================================
// Credentials
// ============================================================================

/// HTTP authentication credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,

    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[inline]
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// ============================================================================
// ContinueOverrides
// ============================================================================

/// Optional changes applied when continuing an intercepted request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinueOverrides {
    /// Replacement URL.
    pub url: Option<String>,

    /// Replacement method.
    pub method: Option<String>,

    /// Replacement post body.
    pub post_data: Option<String>,

    /// Replacement headers.
    pub headers: Option<Headers>,
}

impl ContinueOverrides {
    /// No overrides.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the URL.
    #[inline]
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Overrides the method.
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Overrides the post body.
    #[inline]
    #[must_use]
    pub fn with_post_data(mut self, post_data: impl Into<String>) -> Self {
        self.post_data = Some(post_data.into());
        self
    }

    /// Overrides the headers.
    #[inline]
    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

// ============================================================================
// NetworkEvent
// ============================================================================

/// Lifecycle notification published by the network manager.
///
/// For one request the order is always `Request`, then at most one
/// `Response`, then exactly one of `RequestFinished` / `RequestFailed`.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A request was issued.
    Request(Request),

    /// A response was received.
    Response(Response),

    /// A request completed.
    RequestFinished(Request),

    /// A request failed.
    RequestFailed(Request),
}

impl NetworkEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::RequestFinished(_) => "requestfinished",
            Self::RequestFailed(_) => "requestfailed",
        }
    }

    /// Returns the request the event is about.
    #[must_use]
    pub fn request(&self) -> Option<Request> {
        match self {
            Self::Request(request) | Self::RequestFinished(request) | Self::RequestFailed(request) => {
                Some(request.clone())
            }
            Self::Response(response) => response.request(),
        }
    }
}

//! Event names and typed event decoding.
//!
//! Events are notifications sent from the remote end without an id. The
//! router dispatches on the raw method string; consumers that care about a
//! specific event decode it through [`ParsedEvent::parse`].
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Target` | `receivedMessageFromTarget`, `detachedFromTarget` |
//! | `Network` | `requestWillBeSent`, `responseReceived`, `loadingFinished`, `loadingFailed`, `requestServedFromCache`, `requestIntercepted` |
//! | local | `disconnected` |

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::identifiers::{SessionId, TargetId};

use super::network::{
    LoadingFailed, LoadingFinished, RequestIntercepted, RequestServedFromCache, RequestWillBeSent,
    ResponseReceived,
};

// ============================================================================
// Event Names
// ============================================================================

/// `Target.receivedMessageFromTarget`: wire message delivered to a session.
pub const TARGET_RECEIVED_MESSAGE: &str = "Target.receivedMessageFromTarget";

/// `Target.detachedFromTarget`: a session went away.
pub const TARGET_DETACHED: &str = "Target.detachedFromTarget";

/// `Network.requestWillBeSent`.
pub const NETWORK_REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";

/// `Network.responseReceived`.
pub const NETWORK_RESPONSE_RECEIVED: &str = "Network.responseReceived";

/// `Network.loadingFinished`.
pub const NETWORK_LOADING_FINISHED: &str = "Network.loadingFinished";

/// `Network.loadingFailed`.
pub const NETWORK_LOADING_FAILED: &str = "Network.loadingFailed";

/// `Network.requestServedFromCache`.
pub const NETWORK_REQUEST_SERVED_FROM_CACHE: &str = "Network.requestServedFromCache";

/// `Network.requestIntercepted`.
pub const NETWORK_REQUEST_INTERCEPTED: &str = "Network.requestIntercepted";

/// Local event emitted once when a connection or session is torn down.
pub const DISCONNECTED: &str = "disconnected";

/// Network events the interception manager listens to.
pub const NETWORK_EVENTS: [&str; 6] = [
    NETWORK_REQUEST_WILL_BE_SENT,
    NETWORK_REQUEST_INTERCEPTED,
    NETWORK_REQUEST_SERVED_FROM_CACHE,
    NETWORK_RESPONSE_RECEIVED,
    NETWORK_LOADING_FINISHED,
    NETWORK_LOADING_FAILED,
];

// ============================================================================
// Target Events
// ============================================================================

/// `Target.receivedMessageFromTarget`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessageFromTarget {
    /// Session the message is addressed to.
    pub session_id: SessionId,

    /// Fully-formed wire message, as text.
    pub message: String,

    /// Target of the session.
    #[serde(default)]
    pub target_id: Option<TargetId>,
}

/// `Target.detachedFromTarget`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
    /// Session that went away.
    pub session_id: SessionId,

    /// Target of the session.
    #[serde(default)]
    pub target_id: Option<TargetId>,
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Typed view of an event.
///
/// Payloads that fail to decode (missing required fields, wrong types) are
/// kept verbatim as [`ParsedEvent::Unknown`] rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Message for a session.
    ReceivedMessageFromTarget(ReceivedMessageFromTarget),
    /// Session detached.
    DetachedFromTarget(DetachedFromTarget),
    /// Request about to be sent (or redirected).
    RequestWillBeSent(Box<RequestWillBeSent>),
    /// Response headers received.
    ResponseReceived(Box<ResponseReceived>),
    /// Request finished loading.
    LoadingFinished(LoadingFinished),
    /// Request failed.
    LoadingFailed(LoadingFailed),
    /// Request served from the memory cache.
    RequestServedFromCache(RequestServedFromCache),
    /// Request paused by interception.
    RequestIntercepted(Box<RequestIntercepted>),
    /// Anything else, or a payload that did not decode.
    Unknown {
        /// Event name.
        method: String,
        /// Raw params.
        params: Value,
    },
}

impl ParsedEvent {
    /// Decodes an event by name.
    #[must_use]
    pub fn parse(method: &str, params: Value) -> Self {
        match method {
            TARGET_RECEIVED_MESSAGE => decode(method, params, Self::ReceivedMessageFromTarget),
            TARGET_DETACHED => decode(method, params, Self::DetachedFromTarget),
            NETWORK_REQUEST_WILL_BE_SENT => {
                decode(method, params, |e| Self::RequestWillBeSent(Box::new(e)))
            }
            NETWORK_RESPONSE_RECEIVED => {
                decode(method, params, |e| Self::ResponseReceived(Box::new(e)))
            }
            NETWORK_LOADING_FINISHED => decode(method, params, Self::LoadingFinished),
            NETWORK_LOADING_FAILED => decode(method, params, Self::LoadingFailed),
            NETWORK_REQUEST_SERVED_FROM_CACHE => {
                decode(method, params, Self::RequestServedFromCache)
            }
            NETWORK_REQUEST_INTERCEPTED => {
                decode(method, params, |e| Self::RequestIntercepted(Box::new(e)))
            }
            _ => Self::Unknown {
                method: method.to_string(),
                params,
            },
        }
    }

    /// Returns `true` if the payload was not recognised.
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Decodes `params` as `T`, falling back to `Unknown` on mismatch.
fn decode<T, F>(method: &str, params: Value, wrap: F) -> ParsedEvent
where
    T: DeserializeOwned,
    F: FnOnce(T) -> ParsedEvent,
{
    match T::deserialize(&params) {
        Ok(event) => wrap(event),
        Err(e) => {
            tracing::debug!(method, error = %e, "Event payload did not decode, keeping raw");
            ParsedEvent::Unknown {
                method: method.to_string(),
                params,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

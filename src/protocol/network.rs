//! Network domain payload types.
//!
//! Serde models of the request/response descriptions carried by network
//! events, plus the small enums sent back in `continueInterceptedRequest`.
//! All inbound structs decode tolerantly: missing fields take defaults and
//! non-string header values are stringified.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::identifiers::{FrameId, InterceptionId, LoaderId, RequestId};

// ============================================================================
// Headers
// ============================================================================

/// HTTP header map.
pub type Headers = HashMap<String, String>;

/// Decodes a header object, stringifying non-string values.
fn deserialize_headers<'de, D>(deserializer: D) -> Result<Headers, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

/// Decodes optional headers with the same tolerance.
fn deserialize_optional_headers<'de, D>(deserializer: D) -> Result<Option<Headers>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(name, value)| match value {
                Value::String(text) => (name, text),
                other => (name, other.to_string()),
            })
            .collect()
    }))
}

fn default_method() -> String {
    "GET".to_string()
}

// ============================================================================
// RequestPayload
// ============================================================================

/// Description of an HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    /// Request URL without fragment.
    #[serde(default)]
    pub url: String,

    /// Fragment of the URL (with leading `#`), if any.
    #[serde(default)]
    pub url_fragment: Option<String>,

    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: Headers,

    /// Post body, if any.
    #[serde(default)]
    pub post_data: Option<String>,
}

impl RequestPayload {
    /// Returns the URL including its fragment.
    #[must_use]
    pub fn full_url(&self) -> String {
        match &self.url_fragment {
            Some(fragment) => format!("{}{}", self.url, fragment),
            None => self.url.clone(),
        }
    }
}

// ============================================================================
// ResponsePayload
// ============================================================================

/// TLS details of a response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityDetailsPayload {
    /// Protocol name (e.g. "TLS 1.3").
    #[serde(default)]
    pub protocol: String,

    /// Certificate subject.
    #[serde(default)]
    pub subject_name: String,

    /// Certificate issuer.
    #[serde(default)]
    pub issuer: String,

    /// Validity start (Unix seconds).
    #[serde(default)]
    pub valid_from: f64,

    /// Validity end (Unix seconds).
    #[serde(default)]
    pub valid_to: f64,
}

/// Description of an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    /// Response URL.
    #[serde(default)]
    pub url: String,

    /// HTTP status code.
    #[serde(default)]
    pub status: u16,

    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,

    /// Response headers.
    #[serde(default, deserialize_with = "deserialize_headers")]
    pub headers: Headers,

    /// Served from the disk cache.
    #[serde(default)]
    pub from_disk_cache: bool,

    /// Served by a service worker.
    #[serde(default)]
    pub from_service_worker: bool,

    /// Remote IP address.
    #[serde(default, rename = "remoteIPAddress")]
    pub remote_ip_address: Option<String>,

    /// Remote port.
    #[serde(default)]
    pub remote_port: Option<u16>,

    /// TLS details.
    #[serde(default)]
    pub security_details: Option<SecurityDetailsPayload>,
}

// ============================================================================
// Direct Feed Events
// ============================================================================

/// `Network.requestWillBeSent`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestWillBeSent {
    /// Request id.
    pub request_id: RequestId,

    /// Loader id.
    #[serde(default)]
    pub loader_id: Option<LoaderId>,

    /// Request description.
    pub request: RequestPayload,

    /// Owning frame.
    #[serde(default)]
    pub frame_id: Option<FrameId>,

    /// Resource type (e.g. "Document", "XHR").
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,

    /// Response of the previous hop, when this event is a redirect.
    #[serde(default)]
    pub redirect_response: Option<ResponsePayload>,
}

/// `Network.responseReceived`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    /// Request id.
    pub request_id: RequestId,

    /// Response description.
    pub response: ResponsePayload,
}

/// `Network.loadingFinished`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    /// Request id.
    pub request_id: RequestId,
}

/// `Network.loadingFailed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFailed {
    /// Request id.
    pub request_id: RequestId,

    /// Failure description.
    #[serde(default)]
    pub error_text: String,

    /// Whether the load was cancelled.
    #[serde(default)]
    pub canceled: bool,
}

/// `Network.requestServedFromCache`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestServedFromCache {
    /// Request id.
    pub request_id: RequestId,
}

// ============================================================================
// Interception Feed Events
// ============================================================================

/// Authentication challenge attached to an interception.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    /// "Server" or "Proxy".
    #[serde(default)]
    pub source: Option<String>,

    /// Challenging origin.
    #[serde(default)]
    pub origin: String,

    /// Authentication scheme.
    #[serde(default)]
    pub scheme: String,

    /// Realm.
    #[serde(default)]
    pub realm: String,
}

/// `Network.requestIntercepted`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIntercepted {
    /// Paused request id.
    pub interception_id: InterceptionId,

    /// Request description.
    pub request: RequestPayload,

    /// Owning frame.
    #[serde(default)]
    pub frame_id: Option<FrameId>,

    /// Resource type.
    #[serde(default)]
    pub resource_type: Option<String>,

    /// Whether this is a navigation request.
    #[serde(default)]
    pub is_navigation_request: bool,

    /// Redirect target, when a redirect response was intercepted.
    #[serde(default)]
    pub redirect_url: Option<String>,

    /// Authentication challenge, when one was intercepted.
    #[serde(default)]
    pub auth_challenge: Option<AuthChallenge>,

    /// Status of an intercepted response.
    #[serde(default)]
    pub response_status_code: Option<u16>,

    /// Headers of an intercepted response.
    #[serde(default, deserialize_with = "deserialize_optional_headers")]
    pub response_headers: Option<Headers>,
}

// ============================================================================
// Outbound Types
// ============================================================================

/// URL pattern for request interception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPattern {
    /// Wildcard URL pattern.
    pub url_pattern: String,
}

impl RequestPattern {
    /// Pattern matching every URL.
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self {
            url_pattern: "*".to_string(),
        }
    }
}

/// Decision for an authentication challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthResponse {
    /// Let the browser handle it (usually shows no credentials).
    Default,
    /// Cancel the authentication.
    CancelAuth,
    /// Answer with configured credentials.
    ProvideCredentials,
}

/// Answer to an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthChallengeResponse {
    /// Decision.
    pub response: AuthResponse,

    /// Username (only with `ProvideCredentials`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password (only with `ProvideCredentials`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// ============================================================================
// ErrorReason
// ============================================================================

/// Network error used to abort an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorReason {
    /// The request was aborted.
    Aborted,
    /// Permission denied.
    AccessDenied,
    /// The address is unreachable.
    AddressUnreachable,
    /// Blocked by the client.
    BlockedByClient,
    /// Blocked by the response.
    BlockedByResponse,
    /// The connection was aborted.
    ConnectionAborted,
    /// The connection was closed.
    ConnectionClosed,
    /// The connection failed.
    ConnectionFailed,
    /// The connection was refused.
    ConnectionRefused,
    /// The connection was reset.
    ConnectionReset,
    /// The internet connection was lost.
    InternetDisconnected,
    /// The host name could not be resolved.
    NameNotResolved,
    /// The operation timed out.
    TimedOut,
    /// Generic failure.
    Failed,
}

impl ErrorReason {
    /// All reasons, in table order.
    pub const ALL: [ErrorReason; 14] = [
        Self::Aborted,
        Self::AccessDenied,
        Self::AddressUnreachable,
        Self::BlockedByClient,
        Self::BlockedByResponse,
        Self::ConnectionAborted,
        Self::ConnectionClosed,
        Self::ConnectionFailed,
        Self::ConnectionRefused,
        Self::ConnectionReset,
        Self::InternetDisconnected,
        Self::NameNotResolved,
        Self::TimedOut,
        Self::Failed,
    ];

    /// Human-readable lower-case name (e.g. `"blockedbyclient"`).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Aborted => "aborted",
            Self::AccessDenied => "accessdenied",
            Self::AddressUnreachable => "addressunreachable",
            Self::BlockedByClient => "blockedbyclient",
            Self::BlockedByResponse => "blockedbyresponse",
            Self::ConnectionAborted => "connectionaborted",
            Self::ConnectionClosed => "connectionclosed",
            Self::ConnectionFailed => "connectionfailed",
            Self::ConnectionRefused => "connectionrefused",
            Self::ConnectionReset => "connectionreset",
            Self::InternetDisconnected => "internetdisconnected",
            Self::NameNotResolved => "namenotresolved",
            Self::TimedOut => "timedout",
            Self::Failed => "failed",
        }
    }
}

impl Default for ErrorReason {
    fn default() -> Self {
        Self::Failed
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|reason| reason.name() == wanted)
            .ok_or_else(|| Error::invalid_argument(format!("Unknown error code: {s}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_payload_defaults() {
        let payload: RequestPayload =
            serde_json::from_value(json!({ "url": "https://a.test/" })).expect("decode");
        assert_eq!(payload.method, "GET");
        assert!(payload.headers.is_empty());
        assert_eq!(payload.post_data, None);
    }

    #[test]
    fn test_headers_stringify_non_strings() {
        let payload: RequestPayload = serde_json::from_value(json!({
            "url": "https://a.test/",
            "method": "POST",
            "headers": { "Content-Length": 12, "X-Flag": true }
        }))
        .expect("decode");
        assert_eq!(payload.headers["Content-Length"], "12");
        assert_eq!(payload.headers["X-Flag"], "true");
    }

    #[test]
    fn test_full_url_includes_fragment() {
        let payload: RequestPayload = serde_json::from_value(json!({
            "url": "https://a.test/page",
            "urlFragment": "#top"
        }))
        .expect("decode");
        assert_eq!(payload.full_url(), "https://a.test/page#top");
    }

    #[test]
    fn test_response_payload() {
        let payload: ResponsePayload = serde_json::from_value(json!({
            "url": "https://a.test/",
            "status": 302,
            "statusText": "Found",
            "headers": { "Location": "/b" },
            "remoteIPAddress": "127.0.0.1",
            "remotePort": 443,
            "securityDetails": { "protocol": "TLS 1.3", "subjectName": "a.test", "issuer": "CA", "validFrom": 1.0, "validTo": 2.0 }
        }))
        .expect("decode");
        assert_eq!(payload.status, 302);
        assert_eq!(payload.remote_ip_address.as_deref(), Some("127.0.0.1"));
        let details = payload.security_details.expect("security details");
        assert_eq!(details.subject_name, "a.test");
    }

    #[test]
    fn test_request_intercepted_with_auth() {
        let event: RequestIntercepted = serde_json::from_value(json!({
            "interceptionId": "I1",
            "request": { "url": "https://a.test/", "method": "GET", "headers": {} },
            "frameId": "F1",
            "resourceType": "Document",
            "isNavigationRequest": true,
            "authChallenge": { "origin": "https://a.test", "scheme": "basic", "realm": "r" }
        }))
        .expect("decode");
        assert!(event.auth_challenge.is_some());
        assert!(event.is_navigation_request);
        assert_eq!(event.redirect_url, None);
    }

    #[test]
    fn test_error_reason_parsing() {
        assert_eq!(
            "blockedbyclient".parse::<ErrorReason>().expect("known"),
            ErrorReason::BlockedByClient
        );
        assert_eq!(
            "TimedOut".parse::<ErrorReason>().expect("case-insensitive"),
            ErrorReason::TimedOut
        );
        assert!(matches!(
            "exploded".parse::<ErrorReason>(),
            Err(Error::InvalidArgument { .. })
        ));
        assert_eq!(ErrorReason::default(), ErrorReason::Failed);
    }

    #[test]
    fn test_error_reason_serializes_pascal_case() {
        let json = serde_json::to_string(&ErrorReason::NameNotResolved).expect("serialize");
        assert_eq!(json, "\"NameNotResolved\"");
    }

    #[test]
    fn test_auth_response_serialization() {
        let response = AuthChallengeResponse {
            response: AuthResponse::ProvideCredentials,
            username: Some("user".into()),
            password: Some("pass".into()),
        };
        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(
            json,
            json!({ "response": "ProvideCredentials", "username": "user", "password": "pass" })
        );
    }
}

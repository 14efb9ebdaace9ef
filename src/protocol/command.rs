//! Command definitions organized by domain.
//!
//! Only the commands the core itself issues are modelled here; everything
//! else goes through the raw `send(method, params)` path.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Target` | Attach, detach, forward to session |
//! | `Network` | Enable, interception, headers, conditions, bodies |

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::{InterceptionId, RequestId, SessionId, TargetId};

use super::network::{AuthChallengeResponse, ErrorReason, Headers, RequestPattern};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All typed protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Target domain commands.
    Target(TargetCommand),
    /// Network domain commands.
    Network(NetworkCommand),
}

impl Command {
    /// Splits the command into its method name and params object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let value = serde_json::to_value(&self)?;
        let Value::Object(mut object) = value else {
            return Err(Error::invalid_argument("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::invalid_argument("command has no method name")),
        };
        let params = object
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok((method, params))
    }
}

impl From<TargetCommand> for Command {
    #[inline]
    fn from(command: TargetCommand) -> Self {
        Self::Target(command)
    }
}

impl From<NetworkCommand> for Command {
    #[inline]
    fn from(command: NetworkCommand) -> Self {
        Self::Network(command)
    }
}

// ============================================================================
// Target Commands
// ============================================================================

/// Target domain commands for session management.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum TargetCommand {
    /// Attach to a target, creating a session.
    #[serde(rename = "Target.attachToTarget")]
    AttachToTarget {
        /// Target to attach to.
        #[serde(rename = "targetId")]
        target_id: TargetId,
    },

    /// Detach a session from its target.
    #[serde(rename = "Target.detachFromTarget")]
    DetachFromTarget {
        /// Session to detach.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },

    /// Forward a serialized message to a session.
    #[serde(rename = "Target.sendMessageToTarget")]
    SendMessageToTarget {
        /// Destination session.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
        /// Fully-formed wire message, as text.
        message: String,
    },
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands for request tracking and interception.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network events.
    #[serde(rename = "Network.enable")]
    Enable,

    /// Disable network events.
    #[serde(rename = "Network.disable")]
    Disable,

    /// Set interception patterns (empty disables interception).
    #[serde(rename = "Network.setRequestInterception")]
    SetRequestInterception {
        /// URL patterns to intercept.
        patterns: Vec<RequestPattern>,
    },

    /// Resume, modify, fulfill or fail a paused request.
    #[serde(rename = "Network.continueInterceptedRequest")]
    #[serde(rename_all = "camelCase")]
    ContinueInterceptedRequest {
        /// Paused request.
        interception_id: InterceptionId,
        /// Fail the request with this reason.
        #[serde(skip_serializing_if = "Option::is_none")]
        error_reason: Option<ErrorReason>,
        /// Base64 raw HTTP response to answer with.
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
        /// Override URL.
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Override method.
        #[serde(skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        /// Override post body.
        #[serde(skip_serializing_if = "Option::is_none")]
        post_data: Option<String>,
        /// Override headers.
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<Headers>,
        /// Answer to an authentication challenge.
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_challenge_response: Option<AuthChallengeResponse>,
    },

    /// Set headers sent with every request.
    #[serde(rename = "Network.setExtraHTTPHeaders")]
    SetExtraHttpHeaders {
        /// Header map.
        headers: Headers,
    },

    /// Emulate network conditions.
    #[serde(rename = "Network.emulateNetworkConditions")]
    #[serde(rename_all = "camelCase")]
    EmulateNetworkConditions {
        /// Emulate lost connectivity.
        offline: bool,
        /// Added latency in milliseconds.
        latency: f64,
        /// Download throughput in bytes/s (-1 disables throttling).
        download_throughput: f64,
        /// Upload throughput in bytes/s (-1 disables throttling).
        upload_throughput: f64,
    },

    /// Toggle the HTTP cache.
    #[serde(rename = "Network.setCacheDisabled")]
    SetCacheDisabled {
        /// Disable the cache.
        #[serde(rename = "cacheDisabled")]
        cache_disabled: bool,
    },

    /// Override the user agent.
    #[serde(rename = "Network.setUserAgentOverride")]
    SetUserAgentOverride {
        /// User agent string.
        #[serde(rename = "userAgent")]
        user_agent: String,
    },

    /// Fetch a finished response body.
    #[serde(rename = "Network.getResponseBody")]
    GetResponseBody {
        /// Request whose body to fetch.
        #[serde(rename = "requestId")]
        request_id: RequestId,
    },
}

impl NetworkCommand {
    /// Plain continue for a paused request.
    #[inline]
    #[must_use]
    pub fn continue_intercepted(interception_id: InterceptionId) -> Self {
        Self::ContinueInterceptedRequest {
            interception_id,
            error_reason: None,
            raw_response: None,
            url: None,
            method: None,
            post_data: None,
            headers: None,
            auth_challenge_response: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

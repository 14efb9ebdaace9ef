//! Error types for the DevTools client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use cdp_wire::{Connection, Result};
//!
//! async fn example(connection: &Connection) -> Result<()> {
//!     let version = connection.send("Browser.getVersion", serde_json::json!({})).await?;
//!     println!("{version}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Session | [`Error::SessionClosed`] |
//! | Protocol | [`Error::Protocol`], [`Error::MalformedMessage`] |
//! | Interception | [`Error::Network`], [`Error::InvalidArgument`] |
//! | Execution | [`Error::Timeout`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the WebSocket connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection timeout waiting for the remote endpoint.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The root connection is gone.
    ///
    /// Every outstanding and future root-level call fails with this.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A specific session detached or was torn down.
    ///
    /// Other sessions on the same connection are unaffected.
    #[error("Session closed: {session_id}")]
    SessionClosed {
        /// The closed session.
        session_id: SessionId,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote end answered a command with an error payload.
    ///
    /// Carries the remote message and code verbatim.
    #[error("Protocol error ({method}): {message}{}", detail_suffix(.data))]
    Protocol {
        /// Method of the failed command.
        method: String,
        /// Remote error message.
        message: String,
        /// Remote error code, if any.
        code: Option<i64>,
        /// Remote error detail, if any.
        data: Option<String>,
    },

    /// An inbound frame could not be parsed or routed.
    ///
    /// Logged by the router, never surfaced to a caller.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// Why the frame was rejected.
        reason: String,
    },

    // ========================================================================
    // Interception Errors
    // ========================================================================
    /// Misuse of the request interception API.
    ///
    /// Returned when a request is handled twice or interception is disabled.
    #[error("Network error: {message}")]
    Network {
        /// Description of the misuse.
        message: String,
    },

    /// Invalid argument supplied by the caller.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    ///
    /// Returned when a caller-supplied deadline elapses.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket handshake or protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

/// Formats the optional remote error detail.
fn detail_suffix(data: &Option<String>) -> String {
    data.as_deref().map(|d| format!(" {d}")).unwrap_or_default()
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a session closed error.
    #[inline]
    pub fn session_closed(session_id: SessionId) -> Self {
        Self::SessionClosed { session_id }
    }

    /// Creates a protocol error for a failed command.
    #[inline]
    pub fn protocol(
        method: impl Into<String>,
        message: impl Into<String>,
        code: Option<i64>,
        data: Option<String>,
    ) -> Self {
        Self::Protocol {
            method: method.into(),
            message: message.into(),
            code,
            data,
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a network interception error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if the owning scope (connection or session) is gone.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::SessionClosed { .. })
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the remote end rejected a command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns the remote error code, if this is a protocol error carrying one.
    #[inline]
    #[must_use]
    pub fn protocol_code(&self) -> Option<i64> {
        match self {
            Self::Protocol { code, .. } => *code,
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

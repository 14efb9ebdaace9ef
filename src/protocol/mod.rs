//! Wire protocol message types.
//!
//! This module defines the message format exchanged with the browser over
//! the debugging WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | Command | Local → Remote | `{"id", "method", "params"}` |
//! | Response | Remote → Local | `{"id", "result"}` or `{"id", "error"}` |
//! | Event | Remote → Local | `{"method", "params"}` |
//!
//! # Command Naming
//!
//! Methods follow `Domain.methodName` format:
//!
//! - `Target.attachToTarget`
//! - `Network.continueInterceptedRequest`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Outgoing/incoming frame envelopes |
//! | `command` | Typed commands issued by the core |
//! | `event` | Event names and typed event decoding |
//! | `network` | Network domain payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Typed commands organized by domain.
pub mod command;

/// Event names and typed events.
pub mod event;

/// Frame envelopes.
pub mod message;

/// Network domain payloads.
pub mod network;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, NetworkCommand, TargetCommand};
pub use event::ParsedEvent;
pub use message::{IncomingMessage, OutgoingMessage, RemoteError};
pub use network::{
    AuthChallenge, AuthChallengeResponse, AuthResponse, ErrorReason, Headers, RequestPattern,
    RequestPayload, ResponsePayload, SecurityDetailsPayload,
};

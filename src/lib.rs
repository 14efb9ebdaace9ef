//! cdp-wire - DevTools protocol client core.
//!
//! This library speaks the browser DevTools protocol over a single
//! WebSocket: it correlates commands with responses, multiplexes nested
//! target sessions through `Target.sendMessageToTarget` envelopes, and
//! tracks network requests with optional interception.
//!
//! # Architecture
//!
//! ```text
//! Transport (WebSocket frames)
//!   └── Connection (root scope, ids 1, 2, 3...)
//!         ├── CdpSession (own ids, envelopes via parent)
//!         │     └── CdpSession (nested)
//!         └── NetworkManager (on any Channel)
//! ```
//!
//! Key design principles:
//!
//! - Each scope owns its own pending-call table; ids never leak across scopes
//! - Inbound frames are routed in arrival order by one dispatch task
//! - Events are data-driven: subscribers register by event name
//! - Teardown fails every outstanding call, innermost sessions first
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cdp_wire::{Connection, NetworkEvent, NetworkManager, Result, TargetId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let connection = Connection::connect("ws://127.0.0.1:9222/devtools/browser/abc").await?;
//!     let session = connection.create_session(TargetId::new("PAGE")).await?;
//!
//!     let network = NetworkManager::new(Arc::new(session.clone()));
//!     let mut events = network.subscribe();
//!     network.initialize().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let NetworkEvent::Request(request) = event {
//!             println!("{} {}", request.method(), request.url());
//!         }
//!     }
//!
//!     connection.dispose();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`], [`CdpSession`], [`Channel`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`network`] | [`NetworkManager`], [`Request`], [`Response`] |
//! | [`protocol`] | Wire messages, commands and event payloads |
//! | [`transport`] | WebSocket transport and pending-call table |

// ============================================================================
// Modules
// ============================================================================

/// Root connection, sessions and event routing.
///
/// - [`Connection`] - Root scope over one WebSocket
/// - [`CdpSession`] - Target session multiplexed through its parent
/// - [`Channel`] - Command/event interface shared by both
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Network request tracking and interception.
pub mod network;

/// Protocol message types.
///
/// Envelope framing, typed commands and event payloads.
pub mod protocol;

/// WebSocket transport layer.
///
/// Frame I/O and the per-scope pending-call table.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{
    CdpSession, Channel, Connection, ConnectionBuilder, ConnectionOptions, EventEmitter,
    EventHandler,
};

// Network types
pub use network::{
    ContinueOverrides, Credentials, FulfillResponse, NetworkEvent, NetworkManager, RemoteAddress,
    Request, Response,
};

// Protocol types
pub use protocol::{ErrorReason, Headers};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{
    FrameId, InterceptionId, ListenerId, LoaderId, RequestId, SessionId, TargetId,
};

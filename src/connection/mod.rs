//! Root connection, sessions and event routing.
//!
//! # Architecture
//!
//! ```text
//! Connection (root ids 1, 2, 3...)
//!   ├── CdpSession S1 (own ids 1, 2...) ── envelope via root
//!   │     └── CdpSession S3 ── envelope via S1 via root
//!   └── CdpSession S2
//! ```
//!
//! Every scope shares one routing algorithm: an id that matches an
//! outstanding call resolves it, a session envelope is unwrapped into the
//! addressed child, a detach notification tears the child down, and any
//! other event goes to the scope's subscribers.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Connection options and fluent builder |
//! | `channel` | `Channel` trait shared by connection and sessions |
//! | `core` | Root `Connection` and dispatch task |
//! | `emitter` | String-keyed subscriber table |
//! | `router` | Shared inbound routing |
//! | `session` | `CdpSession` |

// ============================================================================
// Submodules
// ============================================================================

/// Connection options and builder.
pub mod builder;

/// Channel trait.
pub mod channel;

/// Root connection.
pub mod core;

/// Event subscriber table.
pub mod emitter;

/// Inbound routing shared by all scopes.
mod router;

/// Target sessions.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{ConnectionBuilder, ConnectionOptions, DEFAULT_CONNECT_TIMEOUT};
pub use channel::Channel;
pub use self::core::Connection;
pub use emitter::{EventEmitter, EventHandler};
pub use session::CdpSession;

//! WebSocket transport layer.
//!
//! This module owns the physical socket to the browser and the per-scope
//! table of outstanding calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Connection     │                              │  Browser        │
//! │                 │         WebSocket            │                 │
//! │  Transport ─────┼─────────────────────────────►│  DevTools       │
//! │  PendingCalls   │◄─────────────────────────────┤  endpoint       │
//! │                 │      ws://host:port/...      │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `socket` | WebSocket I/O task and frame forwarding |
//! | `pending` | Id allocation and call correlation |

// ============================================================================
// Submodules
// ============================================================================

/// Id allocation and call correlation.
pub mod pending;

/// WebSocket I/O task.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use pending::{CallReceiver, CallScope, Completion, CompletionCallback, PendingCalls};
pub use socket::{Transport, TransportEvent, TransportEvents};

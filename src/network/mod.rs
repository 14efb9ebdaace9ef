//! Network request tracking and interception.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlation` | Request hashing and the two-feed join |
//! | `fulfill` | Raw HTTP responses for fulfilled requests |
//! | `manager` | `NetworkManager` |
//! | `request` | `Request` and interception actions |
//! | `response` | `Response` and lazy body access |
//! | `types` | Credentials, continue overrides, lifecycle events |

// ============================================================================
// Submodules
// ============================================================================

/// Request hashing and feed correlation.
pub mod correlation;

/// Fulfillment responses.
pub mod fulfill;

/// Network manager.
pub mod manager;

/// Tracked requests.
pub mod request;

/// Tracked responses.
pub mod response;

/// Caller-facing value types.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlation::{CorrelationIndex, Multimap, RequestHash};
pub use fulfill::{FulfillResponse, status_text};
pub use manager::NetworkManager;
pub use request::Request;
pub use response::{RemoteAddress, Response};
pub use types::{ContinueOverrides, Credentials, NetworkEvent};

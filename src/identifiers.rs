//! Type-safe identifiers for protocol entities.
//!
//! The remote end assigns string identifiers to targets, sessions, frames and
//! network requests. Wrapping each in its own newtype keeps a `SessionId` from
//! ever being passed where a `TargetId` is expected.
//!
//! | Type | Assigned by | Scope |
//! |------|-------------|-------|
//! | [`TargetId`] | Browser | Page, worker, browser process |
//! | [`SessionId`] | `Target.attachToTarget` | One attachment to a target |
//! | [`FrameId`] | Page | Frame owning a request |
//! | [`LoaderId`] | Page | Document load |
//! | [`RequestId`] | Direct network feed | One network request |
//! | [`InterceptionId`] | Interception feed | One paused request |
//! | [`ListenerId`] | Local | One event subscription |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a debuggable target (page, worker, browser).
    TargetId
}

string_id! {
    /// Identifier of a session attached to a target.
    ///
    /// Assigned by the remote end in the `Target.attachToTarget` result.
    SessionId
}

string_id! {
    /// Identifier of a page frame.
    FrameId
}

string_id! {
    /// Identifier of a document load.
    LoaderId
}

string_id! {
    /// Identifier assigned by the direct network feed to one request.
    RequestId
}

string_id! {
    /// Identifier assigned by the interception feed to one paused request.
    InterceptionId
}

// ============================================================================
// ListenerId
// ============================================================================

/// Global counter for listener IDs.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for one event subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates the next process-unique listener ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id_display_and_serde() {
        let id = SessionId::new("ABC123");
        assert_eq!(id.to_string(), "ABC123");
        assert_eq!(id.as_str(), "ABC123");

        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"ABC123\"");

        let back: SessionId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}

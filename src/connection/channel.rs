//! Command/event channel shared by the root connection and sessions.
//!
//! Anything that can issue commands and deliver events implements
//! [`Channel`]. Higher layers (the network manager, protocol bindings) take
//! an `Arc<dyn Channel>` and never care whether they talk to the browser
//! target or to a nested session.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::protocol::Command;

use super::emitter::EventEmitter;

// ============================================================================
// Channel
// ============================================================================

/// A scope that sends commands and emits events.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Sends a command and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`](crate::Error::Protocol) if the remote end rejects it
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) or
    ///   [`Error::SessionClosed`](crate::Error::SessionClosed) if the scope
    ///   tears down first
    async fn send(&self, method: &str, params: Value) -> Result<Value>;

    /// Sends a command without awaiting its result.
    ///
    /// Remote failures are logged and otherwise dropped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the command cannot be written.
    fn send_detached(&self, method: &str, params: Value) -> Result<()>;

    /// Returns the scope's event subscriber table.
    fn events(&self) -> &EventEmitter;

    /// Sends a typed command and waits for its result.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    async fn execute(&self, command: Command) -> Result<Value> {
        let (method, params) = command.into_parts()?;
        self.send(&method, params).await
    }

    /// Sends a typed command without awaiting its result.
    ///
    /// # Errors
    ///
    /// Same as [`send_detached`](Self::send_detached).
    fn execute_detached(&self, command: Command) -> Result<()> {
        let (method, params) = command.into_parts()?;
        self.send_detached(&method, params)
    }
}

// ============================================================================
// RecordingChannel
// ============================================================================

/// In-memory channel for unit tests.
///
/// Records every command synchronously, answers from canned results, and
/// lets the test emit events as if they came from the browser.
#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rustc_hash::FxHashMap;
    use serde_json::json;

    use super::*;

    /// One recorded command.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Recorded {
        pub method: String,
        pub params: Value,
        pub detached: bool,
    }

    #[derive(Default)]
    pub struct RecordingChannel {
        events: EventEmitter,
        sent: Mutex<Vec<Recorded>>,
        results: Mutex<FxHashMap<String, Result<Value>>>,
    }

    impl RecordingChannel {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Sets the result returned for `method`.
        pub fn respond(&self, method: &str, result: Result<Value>) {
            self.results.lock().insert(method.to_string(), result);
        }

        /// Emits an event to the channel's subscribers.
        pub fn emit(&self, method: &str, params: Value) {
            self.events.emit(method, &params);
        }

        /// Returns and clears everything sent so far.
        pub fn take(&self) -> Vec<Recorded> {
            std::mem::take(&mut *self.sent.lock())
        }

        /// Returns everything sent with `method`, without clearing.
        pub fn sent(&self, method: &str) -> Vec<Recorded> {
            self.sent
                .lock()
                .iter()
                .filter(|r| r.method == method)
                .cloned()
                .collect()
        }

        fn record(&self, method: &str, params: Value, detached: bool) {
            self.sent.lock().push(Recorded {
                method: method.to_string(),
                params,
                detached,
            });
        }

        fn result_for(&self, method: &str) -> Result<Value> {
            match self.results.lock().get(method) {
                Some(Ok(value)) => Ok(value.clone()),
                Some(Err(e)) => Err(crate::Error::protocol(method, e.to_string(), None, None)),
                None => Ok(json!({})),
            }
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        async fn send(&self, method: &str, params: Value) -> Result<Value> {
            self.record(method, params, false);
            self.result_for(method)
        }

        fn send_detached(&self, method: &str, params: Value) -> Result<()> {
            self.record(method, params, true);
            Ok(())
        }

        fn events(&self) -> &EventEmitter {
            &self.events
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

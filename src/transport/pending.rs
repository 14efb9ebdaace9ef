//! Pending-call table.
//!
//! Every scope that issues commands (the root connection and each session)
//! owns one [`PendingCalls`]. Id allocation and registration happen under a
//! single lock so concurrent senders never share an id, and resolution
//! removes the entry under that same lock so a call completes at most once.
//!
//! # Lifecycle
//!
//! ```text
//! register ──► outstanding ──► resolve (result / protocol error)
//!                   │
//!                   ├──────► cancel (dropped without completion)
//!                   │
//!                   └──────► close  (ConnectionClosed / SessionClosed)
//! ```

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::message::Outcome;

// ============================================================================
// CallScope
// ============================================================================

/// Owner of a pending-call table.
///
/// Determines which error outstanding calls observe on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScope {
    /// The root connection.
    Root,
    /// One attached session.
    Session(SessionId),
}

impl CallScope {
    /// Error reported to calls of this scope once it is gone.
    #[must_use]
    pub fn closed_error(&self) -> Error {
        match self {
            Self::Root => Error::ConnectionClosed,
            Self::Session(session_id) => Error::session_closed(session_id.clone()),
        }
    }
}

// ============================================================================
// Completion
// ============================================================================

/// Callback invoked with a call's outcome.
pub type CompletionCallback = Box<dyn FnOnce(Result<Value>) + Send>;

/// Where a call's outcome goes.
pub enum Completion {
    /// A caller is awaiting the result.
    Caller(oneshot::Sender<Result<Value>>),
    /// Invoked inline on the dispatch task.
    Callback(CompletionCallback),
    /// Nobody awaits; failures are only logged.
    Detached,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caller(_) => f.write_str("Caller"),
            Self::Callback(_) => f.write_str("Callback"),
            Self::Detached => f.write_str("Detached"),
        }
    }
}

/// One outstanding command.
#[derive(Debug)]
struct PendingCall {
    /// Method name, kept for diagnostics and error attribution.
    method: String,
    completion: Completion,
}

impl PendingCall {
    fn complete(self, id: u64, result: Result<Value>) {
        match self.completion {
            Completion::Caller(tx) => {
                let _ = tx.send(result);
            }
            Completion::Callback(callback) => callback(result),
            Completion::Detached => {
                if let Err(e) = result {
                    debug!(id, method = %self.method, error = %e, "Detached call failed");
                }
            }
        }
    }
}

// ============================================================================
// PendingCalls
// ============================================================================

#[derive(Debug)]
struct Table {
    next_id: u64,
    calls: FxHashMap<u64, PendingCall>,
    closed: bool,
}

/// Id allocator plus the map of outstanding calls for one scope.
#[derive(Debug)]
pub struct PendingCalls {
    scope: CallScope,
    table: Mutex<Table>,
}

impl PendingCalls {
    /// Creates an empty table. Ids start at 1.
    #[must_use]
    pub fn new(scope: CallScope) -> Self {
        Self {
            scope,
            table: Mutex::new(Table {
                next_id: 1,
                calls: FxHashMap::default(),
                closed: false,
            }),
        }
    }

    /// Returns the owning scope.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &CallScope {
        &self.scope
    }

    /// Allocates an id and records a call awaited by the returned receiver.
    ///
    /// # Errors
    ///
    /// Returns the scope's closed error if the table has been closed.
    pub fn register(&self, method: &str) -> Result<CallReceiver> {
        let (tx, rx) = oneshot::channel();
        let id = self.register_with(method, Completion::Caller(tx))?;
        Ok(CallReceiver::new(id, rx, self.scope.clone()))
    }

    /// Allocates an id and records a fire-and-forget call.
    ///
    /// # Errors
    ///
    /// Returns the scope's closed error if the table has been closed.
    pub fn register_detached(&self, method: &str) -> Result<u64> {
        self.register_with(method, Completion::Detached)
    }

    /// Allocates an id and records a call with an explicit completion.
    ///
    /// # Errors
    ///
    /// Returns the scope's closed error if the table has been closed.
    pub fn register_with(&self, method: &str, completion: Completion) -> Result<u64> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(self.scope.closed_error());
        }

        let id = table.next_id;
        table.next_id += 1;
        table.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                completion,
            },
        );

        trace!(id, method, "Call registered");
        Ok(id)
    }

    /// Completes the call with the response outcome.
    ///
    /// Returns `false` if no call with this id is outstanding.
    pub fn resolve(&self, id: u64, outcome: Outcome) -> bool {
        let Some(call) = self.table.lock().calls.remove(&id) else {
            return false;
        };

        let result = outcome.map_err(|remote| remote.into_error(&call.method));
        call.complete(id, result);
        true
    }

    /// Completes the call with a local failure.
    ///
    /// Returns `false` if no call with this id is outstanding.
    pub fn fail(&self, id: u64, error: Error) -> bool {
        let Some(call) = self.table.lock().calls.remove(&id) else {
            return false;
        };

        call.complete(id, Err(error));
        true
    }

    /// Removes the call without completing it.
    ///
    /// Returns `false` if no call with this id is outstanding.
    pub fn cancel(&self, id: u64) -> bool {
        let removed = self.table.lock().calls.remove(&id);
        if let Some(call) = &removed {
            trace!(id, method = %call.method, "Call cancelled");
        }
        removed.is_some()
    }

    /// Closes the table and fails every outstanding call.
    ///
    /// Returns the number of calls failed. Subsequent registrations fail.
    pub fn close(&self) -> usize {
        let drained: Vec<(u64, PendingCall)> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.calls.drain().collect()
        };

        let count = drained.len();
        for (id, call) in drained {
            call.complete(id, Err(self.scope.closed_error()));
        }

        if count > 0 {
            debug!(count, scope = ?self.scope, "Failed pending calls on close");
        }
        count
    }

    /// Returns `true` once [`close`](Self::close) has run.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    /// Returns the number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().calls.len()
    }

    /// Returns `true` if no call is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// CallReceiver
// ============================================================================

/// Handle to one registered call.
#[derive(Debug)]
pub struct CallReceiver {
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
    scope: CallScope,
}

impl CallReceiver {
    /// Wraps the receiving half of a [`Completion::Caller`].
    #[inline]
    #[must_use]
    pub fn new(id: u64, rx: oneshot::Receiver<Result<Value>>, scope: CallScope) -> Self {
        Self { id, rx, scope }
    }

    /// Returns the wire id the call was registered under.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the call's outcome.
    ///
    /// # Errors
    ///
    /// Returns the remote error, or the scope's closed error if the call was
    /// dropped without completion.
    pub async fn wait(self) -> Result<Value> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(self.scope.closed_error()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

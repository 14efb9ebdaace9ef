//! Sessions attached to individual targets.
//!
//! A session presents the same contract as the root connection but is
//! scoped to one target. Its commands carry their own id space and are
//! wrapped in a `Target.sendMessageToTarget` envelope sent through the
//! parent scope; inbound envelopes are unwrapped by the parent and routed
//! here with the same algorithm the root uses.
//!
//! # Teardown
//!
//! A session is torn down by a detach notification, by [`CdpSession::detach`],
//! or by its parent's teardown. Children go first, then every outstanding
//! call fails with [`Error::SessionClosed`], then `disconnected` is emitted.
//!
//! # Example
//!
//! ```ignore
//! let session = connection.create_session(target_id).await?;
//! session.send("Network.enable", json!({})).await?;
//!
//! let child = session.create_session(worker_target_id).await?;
//! child.send("Runtime.enable", json!({})).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, SessionId, TargetId};
use crate::protocol::event::DISCONNECTED;
use crate::protocol::{Command, OutgoingMessage, TargetCommand};
use crate::transport::{CallScope, Completion};

use super::channel::Channel;
use super::emitter::EventEmitter;
use super::router::{Router, Scope, attach_to_target};

// ============================================================================
// SessionInner
// ============================================================================

struct SessionInner {
    session_id: SessionId,
    target_id: TargetId,
    router: Router,
    parent: Weak<dyn Scope>,
    /// Scope of the parent, for the error reported when it is gone.
    parent_scope: CallScope,
    this: Weak<SessionInner>,
    closed: AtomicBool,
}

impl SessionInner {
    fn envelope(&self, message: String) -> Result<(String, Value)> {
        Command::from(TargetCommand::SendMessageToTarget {
            session_id: self.session_id.clone(),
            message,
        })
        .into_parts()
    }

    fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.router.close_children();
        let failed = self.router.calls.close();
        info!(session_id = %self.session_id, failed, "Session closed");

        self.router.events.emit(DISCONNECTED, &Value::Object(Default::default()));
    }
}

impl Scope for SessionInner {
    fn router(&self) -> &Router {
        &self.router
    }

    fn dispatch(&self, method: &str, params: Value, completion: Completion) -> Result<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::session_closed(self.session_id.clone()));
        }

        let parent = self
            .parent
            .upgrade()
            .ok_or_else(|| self.parent_scope.closed_error())?;

        let id = self.router.calls.register_with(method, completion)?;

        let forwarded = OutgoingMessage::new(id, method, params)
            .to_json()
            .and_then(|text| self.envelope(text));
        let (envelope_method, envelope_params) = match forwarded {
            Ok(parts) => parts,
            Err(e) => {
                self.router.calls.cancel(id);
                return Err(e);
            }
        };

        // The envelope is tracked in the parent; if it fails, so does the call.
        let router_owner = self.this.clone();
        let on_envelope = Completion::Callback(Box::new(move |result| {
            if let Err(e) = result
                && let Some(session) = router_owner.upgrade()
            {
                session.router.calls.fail(id, e);
            }
        }));

        if let Err(e) = parent.dispatch(&envelope_method, envelope_params, on_envelope) {
            self.router.calls.cancel(id);
            return Err(e);
        }

        Ok(id)
    }
}

// ============================================================================
// CdpSession
// ============================================================================

/// A logical attachment to one target.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CdpSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for CdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdpSession")
            .field("session_id", &self.inner.session_id)
            .field("target_id", &self.inner.target_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CdpSession {
    pub(crate) fn new(
        session_id: SessionId,
        target_id: TargetId,
        parent: Weak<dyn Scope>,
        parent_scope: CallScope,
    ) -> Self {
        Self {
            inner: Arc::new_cyclic(|this| SessionInner {
                router: Router::new(CallScope::Session(session_id.clone())),
                session_id,
                target_id,
                parent,
                parent_scope,
                this: this.clone(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn router(&self) -> &Router {
        &self.inner.router
    }

    pub(crate) fn teardown(&self) {
        self.inner.teardown();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the session id assigned by the remote end.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    /// Returns the attached target.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns `true` once the session has been torn down.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of outstanding calls in this session.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.router.calls.len()
    }

    /// Returns the number of live child sessions.
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.router.children.read().len()
    }

    /// Looks up a live child session.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<CdpSession> {
        self.inner.router.children.read().get(session_id).cloned()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a command to the target and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session is dead (nothing is written)
    ///   or tears down before the response
    /// - [`Error::Protocol`] if the target rejects the command
    /// - the envelope's error if forwarding through the parent fails
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.call(method, params)?.wait().await
    }

    /// Sends a command with a caller-side deadline.
    ///
    /// On expiry the pending entry is dropped; a late response is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] on expiry, otherwise as [`send`](Self::send).
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value> {
        let receiver = self.inner.call(method, params)?;
        let id = receiver.id();

        match timeout(deadline, receiver.wait()).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.router.calls.cancel(id);
                Err(Error::timeout(method, deadline.as_millis() as u64))
            }
        }
    }

    /// Attaches to a target through this session.
    ///
    /// The child's envelopes are nested one level deeper.
    ///
    /// # Errors
    ///
    /// Returns the attach command's error, or [`Error::MalformedMessage`] if
    /// the result carries no session id.
    pub async fn create_session(&self, target_id: TargetId) -> Result<CdpSession> {
        let parent: Arc<dyn Scope> = Arc::clone(&self.inner) as Arc<dyn Scope>;
        attach_to_target(parent, target_id).await
    }

    /// Detaches from the target and tears the session down.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if already torn down
    /// - the detach command's error (the session is torn down regardless)
    pub async fn detach(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::session_closed(self.inner.session_id.clone()));
        }

        let result = self.request_detach().await;

        if let Some(parent) = self.inner.parent.upgrade() {
            parent
                .router()
                .children
                .write()
                .remove(&self.inner.session_id);
        }
        self.inner.teardown();

        debug!(session_id = %self.inner.session_id, ok = result.is_ok(), "Session detached");
        result
    }

    async fn request_detach(&self) -> Result<()> {
        let parent = self
            .inner
            .parent
            .upgrade()
            .ok_or_else(|| self.inner.parent_scope.closed_error())?;

        let (method, params) = Command::from(TargetCommand::DetachFromTarget {
            session_id: self.inner.session_id.clone(),
        })
        .into_parts()?;
        parent.call(&method, params)?.wait().await?;
        Ok(())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to an event on this session.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.events.on(event, Arc::new(handler))
    }

    /// Subscribes to the next occurrence of an event on this session.
    pub fn once<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.events.once(event, Arc::new(handler))
    }

    /// Removes a subscription.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.router.events.off(id)
    }
}

#[async_trait]
impl Channel for CdpSession {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        CdpSession::send(self, method, params).await
    }

    fn send_detached(&self, method: &str, params: Value) -> Result<()> {
        self.inner
            .dispatch(method, params, Completion::Detached)
            .map(|_| ())
    }

    fn events(&self) -> &EventEmitter {
        &self.inner.router.events
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    /// Parent scope whose writes always fail.
    struct ClosedParent {
        router: Router,
    }

    impl Scope for ClosedParent {
        fn router(&self) -> &Router {
            &self.router
        }

        fn dispatch(&self, _method: &str, _params: Value, _completion: Completion) -> Result<u64> {
            Err(Error::ConnectionClosed)
        }
    }

    fn child_of(parent: &Arc<ClosedParent>) -> CdpSession {
        let weak: Weak<dyn Scope> = Arc::downgrade(parent) as Weak<dyn Scope>;
        let session = CdpSession::new(
            SessionId::new("S1"),
            TargetId::new("T1"),
            weak,
            CallScope::Root,
        );
        parent
            .router
            .children
            .write()
            .insert(SessionId::new("S1"), session.clone());
        session
    }

    #[tokio::test]
    async fn test_detach_tears_down_when_parent_write_fails() {
        let parent = Arc::new(ClosedParent {
            router: Router::new(CallScope::Root),
        });
        let session = child_of(&parent);

        let disconnected = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&disconnected);
        session.on(DISCONNECTED, move |_| *counter.lock() += 1);

        let err = session.detach().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(session.is_closed());
        assert!(parent.router.children.read().is_empty());
        assert_eq!(*disconnected.lock(), 1);

        let err = session.detach().await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
    }

    #[tokio::test]
    async fn test_send_on_closed_session_writes_nothing() {
        let parent = Arc::new(ClosedParent {
            router: Router::new(CallScope::Root),
        });
        let session = child_of(&parent);
        session.teardown();

        let err = session.send("Runtime.enable", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
        assert_eq!(session.pending_count(), 0);
    }
}

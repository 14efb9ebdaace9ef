//! Inbound routing shared by the root connection and sessions.
//!
//! Each scope owns a [`Router`]: its pending-call table, its child sessions
//! and its subscribers. The same algorithm runs at every nesting level:
//!
//! 1. id matching an outstanding call → resolve that call
//! 2. `Target.receivedMessageFromTarget` → unwrap and route into the child
//! 3. `Target.detachedFromTarget` → tear the child down
//! 4. anything else → emit to subscribers by name
//!
//! Frames that fail at any step are logged and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TargetId};
use crate::protocol::event::{
    DetachedFromTarget, ReceivedMessageFromTarget, TARGET_DETACHED, TARGET_RECEIVED_MESSAGE,
};
use crate::protocol::{Command, IncomingMessage, TargetCommand};
use crate::transport::{CallReceiver, CallScope, Completion, PendingCalls};

use super::emitter::EventEmitter;
use super::session::CdpSession;

// ============================================================================
// Router
// ============================================================================

/// Per-scope routing state.
#[derive(Debug)]
pub(crate) struct Router {
    pub(crate) calls: PendingCalls,
    pub(crate) children: RwLock<FxHashMap<SessionId, CdpSession>>,
    pub(crate) events: EventEmitter,
}

impl Router {
    pub(crate) fn new(scope: CallScope) -> Self {
        Self {
            calls: PendingCalls::new(scope),
            children: RwLock::new(FxHashMap::default()),
            events: EventEmitter::new(),
        }
    }

    /// Routes one inbound frame addressed to this scope.
    pub(crate) fn route(&self, text: &str) {
        let mut message = match IncomingMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping inbound frame");
                return;
            }
        };

        if let Some(id) = message.id {
            if self.calls.resolve(id, message.take_outcome()) {
                return;
            }
            if message.method.is_none() {
                debug!(id, scope = ?self.calls.scope(), "Response for unknown call");
                return;
            }
        }

        let Some(method) = message.method.take() else {
            warn!(
                error = %Error::malformed("frame has neither id nor method"),
                "Dropping inbound frame"
            );
            return;
        };
        let params = message.take_params();

        match method.as_str() {
            TARGET_RECEIVED_MESSAGE => self.deliver_to_child(params),
            TARGET_DETACHED => self.detach_child(params),
            _ => {
                trace!(method, "Event");
                self.events.emit(&method, &params);
            }
        }
    }

    fn deliver_to_child(&self, params: Value) {
        let Some(envelope) = decode::<ReceivedMessageFromTarget>(TARGET_RECEIVED_MESSAGE, params)
        else {
            return;
        };

        let child = self.children.read().get(&envelope.session_id).cloned();
        match child {
            Some(child) if !child.is_closed() => child.router().route(&envelope.message),
            _ => {
                warn!(
                    session_id = %envelope.session_id,
                    error = %Error::malformed("message for unknown session"),
                    "Dropping inbound frame"
                );
            }
        }
    }

    fn detach_child(&self, params: Value) {
        let Some(event) = decode::<DetachedFromTarget>(TARGET_DETACHED, params) else {
            return;
        };

        let child = self.children.write().remove(&event.session_id);
        match child {
            Some(child) => child.teardown(),
            None => debug!(session_id = %event.session_id, "Detach for unknown session"),
        }
    }

    /// Tears down every child session.
    pub(crate) fn close_children(&self) {
        let children: Vec<CdpSession> = self
            .children
            .write()
            .drain()
            .map(|(_, session)| session)
            .collect();

        for child in children {
            child.teardown();
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Option<T> {
    match serde_json::from_value(params) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                method,
                error = %Error::malformed(e.to_string()),
                "Dropping inbound frame"
            );
            None
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Something that owns a router and can write commands toward the socket.
///
/// Implemented by the root connection and every session; a session's parent
/// is a `Weak<dyn Scope>`.
pub(crate) trait Scope: Send + Sync {
    /// Returns this scope's router.
    fn router(&self) -> &Router;

    /// Registers a call with `completion` and writes it out.
    ///
    /// On error nothing stays registered.
    fn dispatch(&self, method: &str, params: Value, completion: Completion) -> Result<u64>;

    /// Registers a call and returns the handle awaiting its outcome.
    fn call(&self, method: &str, params: Value) -> Result<CallReceiver> {
        let (tx, rx) = oneshot::channel();
        let id = self.dispatch(method, params, Completion::Caller(tx))?;
        Ok(CallReceiver::new(id, rx, self.router().calls.scope().clone()))
    }
}

/// Attaches to `target_id` through `parent` and registers the new session.
pub(crate) async fn attach_to_target(
    parent: Arc<dyn Scope>,
    target_id: TargetId,
) -> Result<CdpSession> {
    let (method, params) = Command::from(TargetCommand::AttachToTarget {
        target_id: target_id.clone(),
    })
    .into_parts()?;

    let result = parent.call(&method, params)?.wait().await?;
    let session_id = result
        .get("sessionId")
        .and_then(Value::as_str)
        .map(SessionId::from)
        .ok_or_else(|| Error::malformed("Target.attachToTarget result has no sessionId"))?;

    let parent_scope = parent.router().calls.scope().clone();
    let weak: Weak<dyn Scope> = Arc::downgrade(&parent);
    let session = CdpSession::new(session_id.clone(), target_id, weak, parent_scope.clone());

    if parent.router().calls.is_closed() {
        session.teardown();
        return Err(parent_scope.closed_error());
    }

    parent
        .router()
        .children
        .write()
        .insert(session_id.clone(), session.clone());

    debug!(%session_id, target_id = %session.target_id(), "Session attached");
    Ok(session)
}

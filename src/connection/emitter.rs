//! String-keyed event subscriber table.
//!
//! The protocol's event catalog stays data-driven: subscribers register by
//! event name and receive the raw params object. Handlers run synchronously
//! on the dispatch task in registration order; a panicking handler is caught
//! and logged so one bad subscriber cannot stop routing.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{trace, warn};

use crate::identifiers::ListenerId;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Called with the event's params for each matching event.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    once: bool,
    handler: EventHandler,
}

// ============================================================================
// EventEmitter
// ============================================================================

/// Subscriber table keyed by event name.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<FxHashMap<String, Vec<Listener>>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("EventEmitter")
            .field("events", &listeners.len())
            .finish()
    }
}

impl EventEmitter {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every occurrence of `event`.
    pub fn on(&self, event: &str, handler: EventHandler) -> ListenerId {
        self.add(event, handler, false)
    }

    /// Subscribes to the next occurrence of `event` only.
    pub fn once(&self, event: &str, handler: EventHandler) -> ListenerId {
        self.add(event, handler, true)
    }

    fn add(&self, event: &str, handler: EventHandler, once: bool) -> ListenerId {
        let id = ListenerId::next();
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Listener { id, once, handler });
        trace!(event, %id, once, "Listener added");
        id
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let mut removed = false;

        listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|listener| listener.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });

        removed
    }

    /// Returns the number of subscribers for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }

    /// Removes every subscriber.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    /// Invokes every subscriber of `event` with `params`.
    ///
    /// Returns the number of handlers invoked. Unknown events are ignored.
    pub fn emit(&self, event: &str, params: &Value) -> usize {
        let snapshot: Vec<Listener> = {
            let mut listeners = self.listeners.lock();
            let Some(list) = listeners.get_mut(event) else {
                return 0;
            };

            let snapshot = list.clone();
            list.retain(|listener| !listener.once);
            if list.is_empty() {
                listeners.remove(event);
            }
            snapshot
        };

        for listener in &snapshot {
            let handler = &listener.handler;
            if catch_unwind(AssertUnwindSafe(|| handler(params))).is_err() {
                warn!(event, id = %listener.id, "Event handler panicked");
            }
        }

        snapshot.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    fn counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);
        let handler: EventHandler = Arc::new(move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_on_receives_every_event() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        emitter.on("Page.loadEventFired", handler);

        emitter.emit("Page.loadEventFired", &json!({}));
        emitter.emit("Page.loadEventFired", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_once_is_removed_before_invocation() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        emitter.once("Target.targetCreated", handler);
        assert_eq!(emitter.listener_count("Target.targetCreated"), 1);

        emitter.emit("Target.targetCreated", &json!({}));
        emitter.emit("Target.targetCreated", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count("Target.targetCreated"), 0);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        let id = emitter.on("A.b", handler);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        assert_eq!(emitter.emit("A.b", &json!({})), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let order = Arc::clone(&order);
            emitter.on("A.b", Arc::new(move |_| order.lock().push(tag)));
        }

        emitter.emit("A.b", &json!({}));
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_handler_is_swallowed() {
        let emitter = EventEmitter::new();
        let (count, handler) = counter();
        emitter.on("A.b", Arc::new(|_| panic!("subscriber bug")));
        emitter.on("A.b", handler);

        assert_eq!(emitter.emit("A.b", &json!({})), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let emitter = Arc::new(EventEmitter::new());
        let inner = Arc::clone(&emitter);
        emitter.on(
            "A.b",
            Arc::new(move |_| {
                inner.on("A.c", Arc::new(|_| {}));
            }),
        );

        emitter.emit("A.b", &json!({}));
        assert_eq!(emitter.listener_count("A.c"), 1);
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit("Nobody.listens", &json!({ "x": 1 })), 0);
    }
}

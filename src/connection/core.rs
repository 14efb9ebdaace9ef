//! Root connection and dispatch task.
//!
//! The connection owns the transport, the root pending-call table and the
//! table of top-level sessions. A single dispatch task drains transport
//! events strictly in arrival order and routes each frame before looking at
//! the next one, so every routing and interception state change happens on
//! one logical thread of control.
//!
//! # Dispatch Loop
//!
//! ```text
//! Transport ──Frame──► (slow motion) ──► Router::route
//!           ──Closed─► dispose()
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
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{ListenerId, SessionId, TargetId};
use crate::protocol::OutgoingMessage;
use crate::protocol::event::DISCONNECTED;
use crate::transport::{CallScope, Completion, Transport, TransportEvent, TransportEvents};

use super::builder::{ConnectionBuilder, ConnectionOptions};
use super::channel::Channel;
use super::emitter::EventEmitter;
use super::router::{Router, Scope, attach_to_target};
use super::session::CdpSession;

// ============================================================================
// ConnectionInner
// ============================================================================

struct ConnectionInner {
    url: String,
    router: Router,
    transport: Transport,
    slow_motion: Duration,
    closed: AtomicBool,
}

impl ConnectionInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn dispose(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Sessions first so their calls observe SessionClosed.
        self.router.close_children();
        let failed = self.router.calls.close();
        self.transport.close();

        info!(url = %self.url, failed, "Connection disposed");
        self.router
            .events
            .emit(DISCONNECTED, &Value::Object(Default::default()));
    }
}

impl Scope for ConnectionInner {
    fn router(&self) -> &Router {
        &self.router
    }

    fn dispatch(&self, method: &str, params: Value, completion: Completion) -> Result<u64> {
        let id = self.router.calls.register_with(method, completion)?;

        let written = OutgoingMessage::new(id, method, params)
            .to_json()
            .and_then(|text| self.transport.send(text));

        if let Err(e) = written {
            self.router.calls.cancel(id);
            return Err(e);
        }

        Ok(id)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Root connection to a browser debugging endpoint.
///
/// Handles request/response correlation, event routing and session
/// multiplexing. Spawns an internal dispatch task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("url", &self.inner.url)
            .field("closed", &self.is_closed())
            .field("sessions", &self.session_count())
            .finish()
    }
}

impl Connection {
    /// Creates a connection builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Connects with default options.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `url` is not a `ws`/`wss` URL
    /// - [`Error::ConnectionTimeout`] / [`Error::Connection`] if the handshake fails
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(ConnectionOptions::new(url)?).await
    }

    /// Connects with explicit options.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] / [`Error::Connection`] if the handshake fails
    pub async fn connect_with(options: ConnectionOptions) -> Result<Self> {
        let (transport, events) =
            Transport::connect(options.url.as_str(), options.connect_timeout).await?;
        Ok(Self::with_transport(
            options.url.to_string(),
            transport,
            events,
            options.slow_motion,
        ))
    }

    /// Wraps an established transport and starts dispatching.
    pub fn with_transport(
        url: impl Into<String>,
        transport: Transport,
        events: TransportEvents,
        slow_motion: Duration,
    ) -> Self {
        let inner = Arc::new(ConnectionInner {
            url: url.into(),
            router: Router::new(CallScope::Root),
            transport,
            slow_motion,
            closed: AtomicBool::new(false),
        });

        tokio::spawn(run_dispatch(Arc::downgrade(&inner), events));

        Self { inner }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the endpoint URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Returns `true` once disposed or the socket closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns the number of outstanding root-level calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.router.calls.len()
    }

    /// Returns the number of live top-level sessions.
    #[inline]
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner.router.children.read().len()
    }

    /// Looks up a live top-level session.
    #[must_use]
    pub fn session(&self, session_id: &SessionId) -> Option<CdpSession> {
        self.inner.router.children.read().get(session_id).cloned()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Sends a root-level command and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the response carries an error
    /// - [`Error::ConnectionClosed`] if the connection is or becomes closed
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.call(method, params)?.wait().await
    }

    /// Sends a root-level command with a caller-side deadline.
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

    /// Attaches to a target and registers the resulting session.
    ///
    /// # Errors
    ///
    /// Returns the attach command's error, or [`Error::MalformedMessage`] if
    /// the result carries no session id.
    pub async fn create_session(&self, target_id: TargetId) -> Result<CdpSession> {
        let parent: Arc<dyn Scope> = Arc::clone(&self.inner) as Arc<dyn Scope>;
        attach_to_target(parent, target_id).await
    }

    /// Tears the connection down. Idempotent.
    ///
    /// Fails every outstanding root call with [`Error::ConnectionClosed`],
    /// tears down every session (their calls fail with
    /// [`Error::SessionClosed`]), closes the socket and emits `disconnected`.
    /// No inbound frame is routed afterwards.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to a root-level event.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.router.events.on(event, Arc::new(handler))
    }

    /// Subscribes to the next occurrence of a root-level event.
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
impl Channel for Connection {
    async fn send(&self, method: &str, params: Value) -> Result<Value> {
        Connection::send(self, method, params).await
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
// Dispatch Task
// ============================================================================

async fn run_dispatch(inner: Weak<ConnectionInner>, mut events: TransportEvents) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.is_closed() {
            break;
        }

        match event {
            TransportEvent::Frame(text) => {
                if !inner.slow_motion.is_zero() {
                    sleep(inner.slow_motion).await;
                    if inner.is_closed() {
                        break;
                    }
                }
                inner.router.route(&text);
            }

            TransportEvent::Closed { reason } => {
                info!(url = %inner.url, reason, "Transport closed");
                inner.dispose();
                break;
            }
        }
    }

    debug!("Dispatch task terminated");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{WebSocketStream, accept_async};

    async fn connect_pair() -> (Connection, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            accept_async(stream).await.expect("handshake")
        });

        let connection = Connection::connect(&format!("ws://{addr}"))
            .await
            .expect("connect");
        (connection, server.await.expect("server"))
    }

    async fn next_command(server: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match server.next().await.expect("frame").expect("ok") {
                Message::Text(text) => return serde_json::from_str(text.as_str()).expect("json"),
                _ => continue,
            }
        }
    }

    async fn push(server: &mut WebSocketStream<TcpStream>, value: Value) {
        server
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("push");
    }

    #[tokio::test]
    async fn test_send_resolves_matching_id() {
        let (connection, mut server) = connect_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Browser.getVersion", json!({})).await }
        });

        let command = next_command(&mut server).await;
        assert_eq!(command["id"], 1);
        assert_eq!(command["method"], "Browser.getVersion");
        assert_eq!(command["params"], json!({}));

        push(&mut server, json!({ "id": 1, "result": { "product": "Test/1.0" } })).await;

        let result = call.await.expect("join").expect("result");
        assert_eq!(result["product"], "Test/1.0");
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_protocol_error_is_surfaced() {
        let (connection, mut server) = connect_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Foo.bar", json!({})).await }
        });

        let command = next_command(&mut server).await;
        push(
            &mut server,
            json!({ "id": command["id"], "error": { "code": -32601, "message": "'Foo.bar' wasn't found" } }),
        )
        .await;

        let err = call.await.expect("join").expect_err("protocol error");
        assert_eq!(err.protocol_code(), Some(-32601));
    }

    #[tokio::test]
    async fn test_events_reach_subscribers_in_order() {
        let (connection, mut server) = connect_pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        connection.on("Target.targetCreated", move |params| {
            let _ = tx.send(params["n"].as_u64());
        });

        for n in 0..3 {
            push(
                &mut server,
                json!({ "method": "Target.targetCreated", "params": { "n": n } }),
            )
            .await;
        }

        for n in 0..3 {
            assert_eq!(rx.recv().await, Some(Some(n)));
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (connection, mut server) = connect_pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on("Page.loadEventFired", move |_| {
            let _ = tx.send(());
        });

        server
            .send(Message::Text("{not json".into()))
            .await
            .expect("push");
        push(&mut server, json!({ "method": "Page.loadEventFired", "params": {} })).await;

        assert_eq!(rx.recv().await, Some(()));
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_dispose_fails_pending_and_emits_disconnected() {
        let (connection, mut server) = connect_pair().await;
        let disconnected = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disconnected);
        connection.on(DISCONNECTED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let call = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send("Browser.getVersion", json!({})).await }
        });
        let _ = next_command(&mut server).await;

        connection.dispose();
        connection.dispose();

        assert!(matches!(
            call.await.expect("join"),
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(disconnected.load(Ordering::SeqCst), 1);
        assert!(matches!(
            connection.send("Browser.getVersion", json!({})).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_remote_hangup_disposes() {
        let (connection, mut server) = connect_pair().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection.on(DISCONNECTED, move |_| {
            let _ = tx.send(());
        });

        server.close(None).await.expect("close");
        assert_eq!(rx.recv().await, Some(()));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_send_with_timeout_cancels_entry() {
        let (connection, mut server) = connect_pair().await;

        let result = connection
            .send_with_timeout("Slow.method", json!({}), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert_eq!(connection.pending_count(), 0);

        // A late response for the cancelled id is ignored.
        let command = next_command(&mut server).await;
        push(&mut server, json!({ "id": command["id"], "result": {} })).await;
        assert!(!connection.is_closed());
    }
}

//! WebSocket transport and I/O task.
//!
//! The transport owns the physical socket. A single spawned task selects
//! over inbound socket reads and an outbound queue, so frames leave in the
//! order they were queued and arrive at the consumer in the order they were
//! read.
//!
//! # Event Loop
//!
//! - Text frames are forwarded as [`TransportEvent::Frame`]
//! - Binary, ping and pong frames are ignored
//! - Closure (remote, local or error) is reported once as
//!   [`TransportEvent::Closed`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Something that happened on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete text frame.
    Frame(String),
    /// The socket is gone. Reported exactly once, last.
    Closed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Receiving half for [`TransportEvent`]s.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Internal commands for the I/O task.
enum Outbound {
    /// Write a text frame.
    Text(String),
    /// Close the socket.
    Close,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "Text({} bytes)", text.len()),
            Self::Close => f.write_str("Close"),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Handle to the socket I/O task.
///
/// `Transport` is `Send + Sync`; sends never block.
#[derive(Debug)]
pub struct Transport {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl Transport {
    /// Connects to a WebSocket endpoint.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::Connection`] if the endpoint cannot be reached
    /// - [`Error::WebSocket`] if the endpoint rejects the upgrade
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<(Self, TransportEvents)> {
        debug!(url, timeout_ms = connect_timeout.as_millis() as u64, "Connecting");

        let handshake = timeout(connect_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))?;
        let (ws_stream, _) = match handshake {
            Ok(pair) => pair,
            Err(WsError::Io(e)) => return Err(Error::connection(format!("{url}: {e}"))),
            Err(e) => {
                warn!(url, error = %e, "WebSocket handshake rejected");
                return Err(e.into());
            }
        };

        info!(url, "WebSocket connected");
        Ok(Self::from_stream(ws_stream))
    }

    /// Wraps an already-established WebSocket stream.
    ///
    /// Spawns the I/O task internally.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>) -> (Self, TransportEvents)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_io_loop(
            ws_stream,
            outbound_rx,
            inbound_tx,
            Arc::clone(&closed),
        ));

        (
            Self {
                outbound_tx,
                closed,
            },
            inbound_rx,
        )
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] once the socket is closed.
    pub fn send(&self, text: String) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.outbound_tx
            .send(Outbound::Text(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the socket. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outbound_tx.send(Outbound::Close);
        }
    }

    /// Returns `true` once the socket is closed or closing.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// I/O Task
// ============================================================================

async fn run_io_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    closed: Arc<AtomicBool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        if inbound_tx.send(TransportEvent::Frame(text.as_str().to_owned())).is_err() {
                            let _ = ws_write.close().await;
                            break "consumer dropped".to_string();
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!("WebSocket closed by remote");
                        break frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "closed by remote".to_string());
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break e.to_string();
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break "stream ended".to_string();
                    }

                    // Ignore Binary, Ping, Pong, raw Frame
                    _ => {}
                }
            }

            command = outbound_rx.recv() => {
                match command {
                    Some(Outbound::Text(text)) => {
                        trace!(len = text.len(), "Frame sent");
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to write frame");
                            break e.to_string();
                        }
                    }

                    Some(Outbound::Close) | None => {
                        debug!("Closing WebSocket");
                        let _ = ws_write.close().await;
                        break "closed locally".to_string();
                    }
                }
            }
        }
    };

    closed.store(true, Ordering::SeqCst);
    let _ = inbound_tx.send(TransportEvent::Closed { reason });
    debug!("Transport I/O task terminated");
}

// ============================================================================
// Tests
// ============================================================================

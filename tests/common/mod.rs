//! Shared helpers for integration tests.
//!
//! Provides a scripted browser endpoint:
//! - Local WebSocket server on an ephemeral port
//! - Helpers to read commands and push replies and events
//! - Envelope wrapping/unwrapping for session traffic

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing_subscriber::EnvFilter;

use cdp_wire::{CdpSession, Connection, TargetId};

// ============================================================================
// Logging
// ============================================================================

/// Initialize tracing once per test binary.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cdp_wire=debug")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockBrowser
// ============================================================================

/// Server side of a test connection.
pub struct MockBrowser {
    stream: WebSocketStream<TcpStream>,
}

/// Starts a mock browser and connects a [`Connection`] to it.
pub async fn connect() -> anyhow::Result<(Connection, MockBrowser)> {
    init_logging();

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        anyhow::Ok(accept_async(stream).await?)
    });

    let connection = Connection::connect(&format!("ws://{addr}")).await?;
    let stream = server.await??;
    Ok((connection, MockBrowser { stream }))
}

impl MockBrowser {
    /// Reads the next command frame.
    pub async fn next_command(&mut self) -> anyhow::Result<Value> {
        while let Some(frame) = self.stream.next().await {
            if let Message::Text(text) = frame? {
                return Ok(serde_json::from_str(text.as_str())?);
            }
        }
        anyhow::bail!("connection closed before a command arrived")
    }

    /// Sends a raw frame.
    pub async fn push(&mut self, value: Value) -> anyhow::Result<()> {
        self.stream
            .send(Message::Text(value.to_string().into()))
            .await?;
        Ok(())
    }

    /// Answers a root-level command.
    pub async fn reply(&mut self, id: &Value, result: Value) -> anyhow::Result<()> {
        self.push(json!({ "id": id, "result": result })).await
    }

    /// Pushes a message as if it came from the target behind `session_id`.
    pub async fn push_from(&mut self, session_id: &str, inner: Value) -> anyhow::Result<()> {
        self.push(from_target(session_id, inner)).await
    }

    /// Reads the next command, acknowledges its envelope and returns the
    /// session id and unwrapped inner command.
    pub async fn next_session_command(&mut self) -> anyhow::Result<(String, Value)> {
        let command = self.next_command().await?;
        let Some((session_id, inner)) = unwrap_envelope(&command) else {
            anyhow::bail!("expected an envelope, got {command}");
        };
        self.reply(&command["id"], json!({})).await?;
        Ok((session_id, inner))
    }

    /// Closes the socket from the browser side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// Unwraps a `Target.sendMessageToTarget` command.
pub fn unwrap_envelope(command: &Value) -> Option<(String, Value)> {
    if command["method"] != "Target.sendMessageToTarget" {
        return None;
    }
    let session_id = command["params"]["sessionId"].as_str()?.to_string();
    let inner = serde_json::from_str(command["params"]["message"].as_str()?).ok()?;
    Some((session_id, inner))
}

/// Wraps `inner` in a `Target.receivedMessageFromTarget` event.
pub fn from_target(session_id: &str, inner: Value) -> Value {
    json!({
        "method": "Target.receivedMessageFromTarget",
        "params": {
            "sessionId": session_id,
            "targetId": format!("target-{session_id}"),
            "message": inner.to_string()
        }
    })
}

// ============================================================================
// Sessions
// ============================================================================

/// Attaches a root-level session, answering the attach command.
pub async fn attach(
    connection: &Connection,
    browser: &mut MockBrowser,
    target_id: &str,
    session_id: &str,
) -> anyhow::Result<CdpSession> {
    let task = tokio::spawn({
        let connection = connection.clone();
        let target_id = TargetId::new(target_id);
        async move { connection.create_session(target_id).await }
    });

    let command = browser.next_command().await?;
    anyhow::ensure!(command["method"] == "Target.attachToTarget");
    browser
        .reply(&command["id"], json!({ "sessionId": session_id }))
        .await?;

    Ok(task.await??)
}

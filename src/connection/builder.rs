//! Builder pattern for connection configuration.
//!
//! Provides a fluent API for configuring and opening a [`Connection`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use cdp_wire::Connection;
//!
//! # async fn example() -> cdp_wire::Result<()> {
//! let connection = Connection::builder()
//!     .url("ws://127.0.0.1:9222/devtools/browser/abc")
//!     .connect_timeout(Duration::from_secs(10))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

use super::core::Connection;

// ============================================================================
// Constants
// ============================================================================

/// Default WebSocket handshake timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Validated connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// WebSocket endpoint (`ws` or `wss`).
    pub url: Url,

    /// Handshake timeout.
    pub connect_timeout: Duration,

    /// Delay applied before processing each inbound frame.
    pub slow_motion: Duration,
}

impl ConnectionOptions {
    /// Creates options for `url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is invalid or not `ws`/`wss`.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: parse_ws_url(url)?,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slow_motion: Duration::ZERO,
        })
    }
}

fn parse_ws_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::config(format!("Invalid URL '{raw}': {e}")))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::config(format!(
            "Unsupported URL scheme '{other}'. Expected ws:// or wss://"
        ))),
    }
}

// ============================================================================
// ConnectionBuilder
// ============================================================================

/// Builder for configuring a [`Connection`].
///
/// Use [`Connection::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    /// WebSocket endpoint.
    url: Option<String>,
    /// Handshake timeout.
    connect_timeout: Duration,
    /// Per-frame delay.
    slow_motion: Duration,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            slow_motion: Duration::ZERO,
        }
    }
}

impl ConnectionBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - Browser or page debugging URL (e.g. `ws://127.0.0.1:9222/devtools/browser/<id>`)
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Delays processing of each inbound frame (debug aid).
    #[inline]
    #[must_use]
    pub fn slow_motion(mut self, delay: Duration) -> Self {
        self.slow_motion = delay;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is missing or invalid, or the
    /// timeout is zero.
    pub fn build(self) -> Result<ConnectionOptions> {
        let raw = self.url.ok_or_else(|| {
            Error::config(
                "WebSocket URL is required. Use .url() to set it.\n\
                 Example: Connection::builder().url(\"ws://127.0.0.1:9222/devtools/browser/<id>\")",
            )
        })?;

        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        Ok(ConnectionOptions {
            url: parse_ws_url(&raw)?,
            connect_timeout: self.connect_timeout,
            slow_motion: self.slow_motion,
        })
    }

    /// Validates the configuration and connects.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if validation fails
    /// - [`Error::ConnectionTimeout`] / [`Error::Connection`] if the handshake fails
    pub async fn connect(self) -> Result<Connection> {
        let options = self.build()?;
        Connection::connect_with(options).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let builder = ConnectionBuilder::new();
        assert!(builder.url.is_none());
        assert_eq!(builder.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(builder.slow_motion, Duration::ZERO);
    }

    #[test]
    fn test_build_requires_url() {
        let err = ConnectionBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("URL is required"));
    }

    #[test]
    fn test_build_rejects_http_scheme() {
        let err = ConnectionBuilder::new()
            .url("http://127.0.0.1:9222/json")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported URL scheme 'http'"));
    }

    #[test]
    fn test_build_rejects_garbage() {
        let err = ConnectionBuilder::new().url("not a url").build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let err = ConnectionBuilder::new()
            .url("ws://127.0.0.1:9222/devtools/browser/x")
            .connect_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_build_valid() {
        let options = ConnectionBuilder::new()
            .url("wss://example.test/devtools/page/1")
            .connect_timeout(Duration::from_secs(5))
            .slow_motion(Duration::from_millis(10))
            .build()
            .expect("valid options");

        assert_eq!(options.url.scheme(), "wss");
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.slow_motion, Duration::from_millis(10));
    }

    #[test]
    fn test_options_new_defaults() {
        let options = ConnectionOptions::new("ws://127.0.0.1:1/").expect("valid");
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(options.slow_motion.is_zero());
    }
}

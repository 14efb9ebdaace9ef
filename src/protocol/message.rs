//! Wire message types.
//!
//! Every frame is a UTF-8 JSON object. Outbound commands carry a numeric id
//! scoped to the connection or session that issued them; inbound frames are
//! either responses (carrying the id back) or events (no id).
//!
//! # Format
//!
//! | Kind | Shape |
//! |------|-------|
//! | Command | `{"id": 1, "method": "Domain.method", "params": {...}}` |
//! | Result | `{"id": 1, "result": {...}}` |
//! | Error | `{"id": 1, "error": {"message": "...", "code": -32000}}` |
//! | Event | `{"method": "Domain.event", "params": {...}}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// OutgoingMessage
// ============================================================================

/// A command from the local end to the remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Network.enable",
///   "params": {}
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage<'a> {
    /// Scope-local correlation id.
    pub id: u64,

    /// Method in `Domain.method` format.
    pub method: &'a str,

    /// Method parameters (always an object).
    pub params: Value,
}

impl<'a> OutgoingMessage<'a> {
    /// Creates a command message.
    ///
    /// `null` params are normalized to an empty object.
    #[inline]
    #[must_use]
    pub fn new(id: u64, method: &'a str, params: Value) -> Self {
        let params = match params {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Self { id, method, params }
    }

    /// Serializes the command to its wire text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Error payload of a failed command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteError {
    /// Remote error message.
    #[serde(default)]
    pub message: String,

    /// Remote error code.
    #[serde(default)]
    pub code: Option<i64>,

    /// Additional detail (string or structured).
    #[serde(default)]
    pub data: Option<Value>,
}

impl RemoteError {
    /// Converts into a crate error attributed to `method`.
    #[must_use]
    pub fn into_error(self, method: &str) -> Error {
        let data = self.data.map(|data| match data {
            Value::String(text) => text,
            other => other.to_string(),
        });
        Error::protocol(method, self.message, self.code, data)
    }
}

// ============================================================================
// IncomingMessage
// ============================================================================

/// Any frame from the remote end.
///
/// Decoding is tolerant: every field is optional so that routing can decide
/// what the frame is. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingMessage {
    /// Correlation id (responses only).
    #[serde(default)]
    pub id: Option<u64>,

    /// Event name (events only).
    #[serde(default)]
    pub method: Option<String>,

    /// Event parameters.
    #[serde(default)]
    pub params: Option<Value>,

    /// Success payload.
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload.
    #[serde(default)]
    pub error: Option<RemoteError>,
}

/// Outcome carried by a response frame.
pub type Outcome = std::result::Result<Value, RemoteError>;

impl IncomingMessage {
    /// Parses a wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the frame is not a JSON object.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;

        if !value.is_object() {
            return Err(Error::malformed("frame is not a JSON object"));
        }

        serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))
    }

    /// Returns `true` if the frame carries an id.
    #[inline]
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.id.is_some()
    }

    /// Takes the response outcome out of the frame.
    ///
    /// An error payload wins over a result; a frame with neither resolves to
    /// `null`.
    #[must_use]
    pub fn take_outcome(&mut self) -> Outcome {
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self.result.take().unwrap_or(Value::Null)),
        }
    }

    /// Takes the event params out of the frame, defaulting to `{}`.
    #[must_use]
    pub fn take_params(&mut self) -> Value {
        self.params
            .take()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_outgoing_wire_format() {
        let message = OutgoingMessage::new(1, "Network.enable", json!({}));
        let text = message.to_json().expect("serialize");
        assert_eq!(text, r#"{"id":1,"method":"Network.enable","params":{}}"#);
    }

    #[test]
    fn test_outgoing_null_params_become_object() {
        let message = OutgoingMessage::new(3, "Page.reload", Value::Null);
        let text = message.to_json().expect("serialize");
        assert_eq!(text, r#"{"id":3,"method":"Page.reload","params":{}}"#);
    }

    #[test]
    fn test_parse_result() {
        let mut message =
            IncomingMessage::parse(r#"{"id": 4, "result": {"frameId": "F1"}}"#).expect("parse");
        assert!(message.is_response());
        assert_eq!(message.id, Some(4));
        let outcome = message.take_outcome().expect("success");
        assert_eq!(outcome["frameId"], "F1");
    }

    #[test]
    fn test_parse_error() {
        let mut message = IncomingMessage::parse(
            r#"{"id": 9, "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}"#,
        )
        .expect("parse");

        let error = message.take_outcome().expect_err("error outcome");
        assert_eq!(error.code, Some(-32601));

        let err = error.into_error("Foo.bar");
        assert!(err.is_protocol_error());
        assert_eq!(err.protocol_code(), Some(-32601));
    }

    #[test]
    fn test_parse_error_with_structured_data() {
        let mut message = IncomingMessage::parse(
            r#"{"id": 2, "error": {"message": "bad", "data": {"field": "url"}}}"#,
        )
        .expect("parse");

        let err = message
            .take_outcome()
            .expect_err("error outcome")
            .into_error("Page.navigate");
        match err {
            Error::Protocol { data, code, .. } => {
                assert_eq!(data.as_deref(), Some(r#"{"field":"url"}"#));
                assert_eq!(code, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_event_defaults_params() {
        let mut message =
            IncomingMessage::parse(r#"{"method": "Page.loadEventFired"}"#).expect("parse");
        assert!(!message.is_response());
        assert_eq!(message.method.as_deref(), Some("Page.loadEventFired"));
        assert_eq!(message.take_params(), json!({}));
    }

    #[test]
    fn test_response_without_result_is_null() {
        let mut message = IncomingMessage::parse(r#"{"id": 1}"#).expect("parse");
        assert_eq!(message.take_outcome().expect("success"), Value::Null);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let message =
            IncomingMessage::parse(r#"{"id": 1, "result": {}, "sessionId": "abc", "extra": [1]}"#)
                .expect("parse");
        assert_eq!(message.id, Some(1));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            IncomingMessage::parse("not json"),
            Err(Error::MalformedMessage { .. })
        ));
        assert!(matches!(
            IncomingMessage::parse("[1, 2, 3]"),
            Err(Error::MalformedMessage { .. })
        ));
        assert!(matches!(
            IncomingMessage::parse(r#"{"id": "seven"}"#),
            Err(Error::MalformedMessage { .. })
        ));
    }
}

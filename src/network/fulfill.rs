//! Synthetic responses for fulfilled requests.
//!
//! A fulfilled request is answered with a raw HTTP/1.1 response built
//! locally and handed to the browser base64-encoded.
//!
//! # Format
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! content-type: text/plain\r\n
//! content-length: 2\r\n
//! \r\n
//! hi
//! ```

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;

// ============================================================================
// FulfillResponse
// ============================================================================

/// Response used to fulfill an intercepted request.
///
/// # Example
///
/// ```ignore
/// let response = FulfillResponse::new()
///     .with_status(404)
///     .with_content_type("text/html")
///     .with_body("<h1>gone</h1>");
/// request.fulfill(response).await?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillResponse {
    /// HTTP status code.
    pub status: u16,

    /// Headers in insertion order.
    pub headers: Vec<(String, String)>,

    /// Shorthand for the `content-type` header.
    pub content_type: Option<String>,

    /// Response body.
    pub body: Vec<u8>,
}

impl Default for FulfillResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            content_type: None,
            body: Vec::new(),
        }
    }
}

impl FulfillResponse {
    /// Creates an empty `200` response.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status code.
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the content type.
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the raw HTTP response bytes.
    ///
    /// Header names are lower-cased; a later duplicate replaces the earlier
    /// value in place. `content-length` is added for a non-empty body unless
    /// already present.
    #[must_use]
    pub fn to_raw(&self) -> Vec<u8> {
        let mut headers: Vec<(String, String)> = Vec::with_capacity(self.headers.len() + 2);
        for (name, value) in &self.headers {
            upsert(&mut headers, name.to_ascii_lowercase(), value.clone());
        }

        if let Some(content_type) = &self.content_type {
            upsert(&mut headers, "content-type".to_string(), content_type.clone());
        }

        if !self.body.is_empty() && !headers.iter().any(|(name, _)| name == "content-length") {
            headers.push(("content-length".to_string(), self.body.len().to_string()));
        }

        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status));
        for (name, value) in &headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(&self.body);
        raw
    }

    /// Builds the raw response and base64-encodes it.
    #[must_use]
    pub fn to_base64(&self) -> String {
        Base64Standard.encode(self.to_raw())
    }
}

fn upsert(headers: &mut Vec<(String, String)>, name: String, value: String) {
    match headers.iter_mut().find(|(existing, _)| *existing == name) {
        Some(entry) => entry.1 = value,
        None => headers.push((name, value)),
    }
}

// ============================================================================
// Status Texts
// ============================================================================

/// Returns the standard reason phrase for `status`, or `""` if unknown.
#[must_use]
pub fn status_text(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        _ => "",
    }
}

// ============================================================================
// Tests
// ============================================================================

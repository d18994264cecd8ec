//! Transport-level message envelope.

use std::collections::HashMap;

use bytes::Bytes;

/// Header carrying the wire format of a message body.
pub const CONTENT_TYPE: &str = "Content-Type";

/// A framed message exchanged over a transport socket.
///
/// The header is a flat string map; the body is opaque and only interpreted
/// by the codec selected from the `Content-Type` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Message {
    /// Header key/value pairs. Keys are matched exactly.
    pub header: HashMap<String, String>,
    /// Encoded request or response body.
    pub body: Bytes,
}

impl Message {
    /// Create a message with an empty header.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            header: HashMap::new(),
            body: body.into(),
        }
    }

    /// Set a header value, replacing any previous one.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.header.insert(key.into(), value.into());
        self
    }

    /// The `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header.get(CONTENT_TYPE).map(String::as_str)
    }

    /// Remove and return the `Content-Type` header.
    ///
    /// The remaining headers are request metadata; the content type is a
    /// framing concern and never reaches handlers.
    pub fn take_content_type(&mut self) -> Option<String> {
        self.header.remove(CONTENT_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_empty_header() {
        let msg = Message::new("body");
        assert!(msg.header.is_empty());
        assert_eq!(&msg.body[..], b"body");
    }

    #[test]
    fn with_header_sets_value() {
        let msg = Message::new(Bytes::new())
            .with_header(CONTENT_TYPE, "application/json")
            .with_header("X-Trace", "abc");
        assert_eq!(msg.content_type(), Some("application/json"));
        assert_eq!(msg.header.get("X-Trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn with_header_overwrites() {
        let msg = Message::default()
            .with_header("k", "v1")
            .with_header("k", "v2");
        assert_eq!(msg.header.len(), 1);
        assert_eq!(msg.header["k"], "v2");
    }

    #[test]
    fn take_content_type_strips_header() {
        let mut msg = Message::default()
            .with_header(CONTENT_TYPE, "application/octet-stream")
            .with_header("User", "alice");
        assert_eq!(
            msg.take_content_type().as_deref(),
            Some("application/octet-stream")
        );
        assert!(msg.content_type().is_none());
        assert_eq!(msg.header.len(), 1);
    }

    #[test]
    fn content_type_lookup_is_case_sensitive() {
        let msg = Message::default().with_header("content-type", "application/json");
        assert!(msg.content_type().is_none());
    }
}

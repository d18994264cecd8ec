//! # microrpc-codec
//!
//! Wire formats for request and response bodies, chosen per message by its
//! `Content-Type` header:
//!
//! - `application/json`: JSON-RPC 1.0 style objects ([`JsonCodec`])
//! - `application/octet-stream`: length-delimited protobuf frames ([`ProtoCodec`])
//!
//! A [`Codec`] describes one format. Binding it to a connection's [`Buffer`]
//! yields a [`ServerCodec`] that decodes exactly one [`Request`] and encodes
//! exactly one [`Response`]. [`CodecSelector`] maps content types to codecs.

#![deny(unsafe_code)]

pub mod errors;
pub mod json;
pub mod proto;
pub mod selector;

use bytes::{Bytes, BytesMut};
use microrpc_core::{ErrorBody, RpcError};
use serde_json::Value;

pub use errors::CodecError;
pub use json::{APPLICATION_JSON, JsonCodec};
pub use proto::{APPLICATION_OCTET_STREAM, ProtoCodec};
pub use selector::CodecSelector;

/// A decoded request.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// Caller-chosen identifier echoed in the response (`null` when absent).
    pub id: Value,
    /// Target method, `Service.Method` or a route alias.
    pub method: String,
    /// Method argument.
    pub params: Value,
}

impl Request {
    /// Build a request.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A response to encode.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// Echoed request identifier.
    pub id: Value,
    /// Result payload (present on success).
    pub result: Option<Value>,
    /// Error payload (present on failure).
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Value, error: &RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.to_error_body()),
        }
    }

    /// Whether this response carries a result.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into the handler outcome it encodes.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(body) => Err(body.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Input and output byte regions owned by one connection.
#[derive(Debug, Default)]
pub struct Buffer {
    input: Bytes,
    output: BytesMut,
}

impl Buffer {
    /// Wrap a received body; the output region starts empty.
    pub fn new(input: impl Into<Bytes>) -> Self {
        Self {
            input: input.into(),
            output: BytesMut::new(),
        }
    }

    /// The received body.
    pub fn input(&self) -> &Bytes {
        &self.input
    }

    /// The region responses are encoded into.
    pub fn output_mut(&mut self) -> &mut BytesMut {
        &mut self.output
    }

    /// Consume the buffer, returning what was written.
    pub fn into_output(self) -> Bytes {
        self.output.freeze()
    }
}

/// Server half of a codec, bound to one connection's [`Buffer`].
pub trait ServerCodec: Send {
    /// Decode the request from the input region.
    fn read_request(&mut self) -> Result<Request, CodecError>;

    /// Encode a response into the output region.
    fn write_response(&mut self, response: &Response) -> Result<(), CodecError>;

    /// Release the buffer, returning the encoded response body.
    fn into_body(self: Box<Self>) -> Bytes;
}

/// A wire format.
pub trait Codec: Send + Sync {
    /// The `Content-Type` value that selects this codec.
    fn content_type(&self) -> &str;

    /// Bind the format to a connection's buffers.
    fn new_server_codec(&self, buffer: Buffer) -> Box<dyn ServerCodec>;

    /// Client side: encode a request body.
    fn encode_request(&self, request: &Request) -> Result<Bytes, CodecError>;

    /// Client side: decode a response body.
    fn decode_response(&self, body: &[u8]) -> Result<Response, CodecError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn buffer_output_starts_empty() {
        let mut buf = Buffer::new(Bytes::from_static(b"in"));
        assert_eq!(&buf.input()[..], b"in");
        buf.output_mut().extend_from_slice(b"out");
        assert_eq!(&buf.into_output()[..], b"out");
    }

    #[test]
    fn success_response_into_result() {
        let resp = Response::success(json!(1), json!("hi"));
        assert!(resp.is_success());
        assert_eq!(resp.into_result().unwrap(), json!("hi"));
    }

    #[test]
    fn error_response_into_result() {
        let err = RpcError::MethodNotFound {
            method: "A.B".into(),
        };
        let resp = Response::error(Value::Null, &err);
        assert!(!resp.is_success());
        let back = resp.into_result().unwrap_err();
        assert_eq!(back.code(), "METHOD_NOT_FOUND");
        assert_eq!(back.to_string(), err.to_string());
    }
}

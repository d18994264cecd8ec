//! JSON-RPC 1.0 style codec.
//!
//! Requests are `{"method": "...", "params": [arg], "id": ...}`. A `params`
//! array passes its first element to the handler (`null` when empty); any
//! other `params` value is passed as is. Responses are
//! `{"id": ..., "result": ..., "error": null | {"code", "message"}}`.

use bytes::Bytes;
use microrpc_core::ErrorBody;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Buffer, Codec, CodecError, Request, Response, ServerCodec};

/// Content type selecting [`JsonCodec`].
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Deserialize, Serialize)]
struct WireRequest {
    method: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    id: Value,
}

#[derive(Debug, Deserialize, Serialize)]
struct WireResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ErrorBody>,
}

/// Unwrap the positional-argument convention.
fn first_param(params: Option<Value>) -> Value {
    match params {
        Some(Value::Array(items)) => items.into_iter().next().unwrap_or(Value::Null),
        Some(other) => other,
        None => Value::Null,
    }
}

/// `application/json` codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    fn new_server_codec(&self, buffer: Buffer) -> Box<dyn ServerCodec> {
        Box::new(JsonServerCodec { buffer })
    }

    fn encode_request(&self, request: &Request) -> Result<Bytes, CodecError> {
        let wire = WireRequest {
            method: request.method.clone(),
            params: Some(Value::Array(vec![request.params.clone()])),
            id: request.id.clone(),
        };
        Ok(Bytes::from(serde_json::to_vec(&wire)?))
    }

    fn decode_response(&self, body: &[u8]) -> Result<Response, CodecError> {
        let wire: WireResponse = serde_json::from_slice(body)?;
        Ok(match wire.error {
            Some(error) => Response {
                id: wire.id,
                result: None,
                error: Some(error),
            },
            None => Response::success(wire.id, wire.result),
        })
    }
}

struct JsonServerCodec {
    buffer: Buffer,
}

impl ServerCodec for JsonServerCodec {
    fn read_request(&mut self) -> Result<Request, CodecError> {
        let wire: WireRequest = serde_json::from_slice(self.buffer.input())?;
        if wire.method.is_empty() {
            return Err(CodecError::MissingMethod);
        }
        Ok(Request {
            id: wire.id,
            method: wire.method,
            params: first_param(wire.params),
        })
    }

    fn write_response(&mut self, response: &Response) -> Result<(), CodecError> {
        let wire = WireResponse {
            id: response.id.clone(),
            result: response.result.clone().unwrap_or(Value::Null),
            error: response.error.clone(),
        };
        serde_json::to_writer(bytes::BufMut::writer(self.buffer.output_mut()), &wire)?;
        Ok(())
    }

    fn into_body(self: Box<Self>) -> Bytes {
        self.buffer.into_output()
    }
}

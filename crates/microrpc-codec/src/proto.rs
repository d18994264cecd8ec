//! Protobuf codec.
//!
//! Bodies are a single varint length-prefixed frame. Arguments and results
//! are carried as `google.protobuf.Value` so handlers keep one JSON-shaped
//! view of their data regardless of the wire format.

use bytes::Bytes;
use microrpc_core::ErrorBody;
use prost::Message as _;
use prost_types::value::Kind;
use serde_json::Value;

use crate::{Buffer, Codec, CodecError, Request, Response, ServerCodec};

/// Content type selecting [`ProtoCodec`].
pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

/// Largest integer an `f64` represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// ── Frames ──────────────────────────────────────────────────────────

/// Request frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct RequestFrame {
    /// Request sequence number.
    #[prost(uint64, tag = "1")]
    pub seq: u64,
    /// `Service.Method` name.
    #[prost(string, tag = "2")]
    pub method: String,
    /// Method argument.
    #[prost(message, optional, tag = "3")]
    pub params: Option<prost_types::Value>,
}

/// Response frame.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ResponseFrame {
    /// Echoed request sequence number.
    #[prost(uint64, tag = "1")]
    pub seq: u64,
    /// Result payload.
    #[prost(message, optional, tag = "2")]
    pub result: Option<prost_types::Value>,
    /// Error payload.
    #[prost(message, optional, tag = "3")]
    pub error: Option<ErrorFrame>,
}

/// Error carried in a [`ResponseFrame`].
#[derive(Clone, PartialEq, prost::Message)]
pub struct ErrorFrame {
    /// Machine-readable code.
    #[prost(string, tag = "1")]
    pub code: String,
    /// Human-readable message.
    #[prost(string, tag = "2")]
    pub message: String,
}

// ── Value mapping ───────────────────────────────────────────────────

/// Convert a JSON value into a protobuf `Value`.
pub fn to_proto_value(value: &Value) -> prost_types::Value {
    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or_default()),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue {
            values: items.iter().map(to_proto_value).collect(),
        }),
        Value::Object(map) => Kind::StructValue(prost_types::Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), to_proto_value(v)))
                .collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

/// Convert a protobuf `Value` back into JSON.
///
/// Whole numbers within the exactly-representable range come back as JSON
/// integers; a non-finite number becomes `null`.
pub fn from_proto_value(value: prost_types::Value) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::NumberValue(n)) => number_to_json(n),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(from_proto_value).collect())
        }
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, from_proto_value(v)))
                .collect(),
        ),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn seq_of(id: &Value) -> u64 {
    id.as_u64().unwrap_or_default()
}

// ── Codec ───────────────────────────────────────────────────────────

/// `application/octet-stream` codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtoCodec;

impl Codec for ProtoCodec {
    fn content_type(&self) -> &str {
        APPLICATION_OCTET_STREAM
    }

    fn new_server_codec(&self, buffer: Buffer) -> Box<dyn ServerCodec> {
        Box::new(ProtoServerCodec { buffer })
    }

    fn encode_request(&self, request: &Request) -> Result<Bytes, CodecError> {
        let frame = RequestFrame {
            seq: seq_of(&request.id),
            method: request.method.clone(),
            params: Some(to_proto_value(&request.params)),
        };
        Ok(Bytes::from(frame.encode_length_delimited_to_vec()))
    }

    fn decode_response(&self, body: &[u8]) -> Result<Response, CodecError> {
        let frame = ResponseFrame::decode_length_delimited(body)?;
        let id = Value::from(frame.seq);
        Ok(match frame.error {
            Some(error) => Response {
                id,
                result: None,
                error: Some(ErrorBody {
                    code: error.code,
                    message: error.message,
                }),
            },
            None => Response::success(id, frame.result.map_or(Value::Null, from_proto_value)),
        })
    }
}

struct ProtoServerCodec {
    buffer: Buffer,
}

impl ServerCodec for ProtoServerCodec {
    fn read_request(&mut self) -> Result<Request, CodecError> {
        let frame = RequestFrame::decode_length_delimited(self.buffer.input().clone())?;
        if frame.method.is_empty() {
            return Err(CodecError::MissingMethod);
        }
        Ok(Request {
            id: Value::from(frame.seq),
            method: frame.method,
            params: frame.params.map_or(Value::Null, from_proto_value),
        })
    }

    fn write_response(&mut self, response: &Response) -> Result<(), CodecError> {
        let frame = ResponseFrame {
            seq: seq_of(&response.id),
            result: response.result.as_ref().map(to_proto_value),
            error: response.error.as_ref().map(|e| ErrorFrame {
                code: e.code.clone(),
                message: e.message.clone(),
            }),
        };
        frame.encode_length_delimited(self.buffer.output_mut())?;
        Ok(())
    }

    fn into_body(self: Box<Self>) -> Bytes {
        self.buffer.into_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microrpc_core::RpcError;
    use serde_json::json;

    #[test]
    fn nested_value_survives_mapping() {
        let v = json!({"a": [1, 2.5, "s", null, true], "b": {"c": -4}});
        assert_eq!(from_proto_value(to_proto_value(&v)), v);
    }

    #[test]
    fn large_integers_become_floats() {
        let big = 2f64.powi(60);
        let back = from_proto_value(prost_types::Value {
            kind: Some(Kind::NumberValue(big)),
        });
        assert_eq!(back.as_f64(), Some(big));
        assert!(back.as_i64().is_none());
    }

    #[test]
    fn missing_kind_is_null() {
        assert_eq!(from_proto_value(prost_types::Value { kind: None }), Value::Null);
    }

    #[test]
    fn server_reads_client_request() {
        let body = ProtoCodec
            .encode_request(&Request::new(42, "Echo.Say", json!({"text": "hi"})))
            .unwrap();
        let req = ProtoCodec
            .new_server_codec(Buffer::new(body))
            .read_request()
            .unwrap();
        assert_eq!(req.id, json!(42));
        assert_eq!(req.method, "Echo.Say");
        assert_eq!(req.params, json!({"text": "hi"}));
    }

    #[test]
    fn client_reads_server_error_response() {
        let mut codec = ProtoCodec.new_server_codec(Buffer::new(Bytes::new()));
        let err = RpcError::InvalidParams {
            message: "missing text".into(),
        };
        codec.write_response(&Response::error(json!(9), &err)).unwrap();
        let resp = ProtoCodec.decode_response(&codec.into_body()).unwrap();
        assert_eq!(resp.id, json!(9));
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert_eq!(err.to_string(), "missing text");
    }

    #[test]
    fn truncated_frame_is_decode_error() {
        let body = ProtoCodec
            .encode_request(&Request::new(1, "A.B", Value::Null))
            .unwrap();
        let truncated = body.slice(..body.len() - 1);
        let result = ProtoCodec
            .new_server_codec(Buffer::new(truncated))
            .read_request();
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn empty_method_rejected() {
        let frame = RequestFrame {
            seq: 1,
            method: String::new(),
            params: None,
        };
        let body = Bytes::from(frame.encode_length_delimited_to_vec());
        let result = ProtoCodec.new_server_codec(Buffer::new(body)).read_request();
        assert!(matches!(result, Err(CodecError::MissingMethod)));
    }
}

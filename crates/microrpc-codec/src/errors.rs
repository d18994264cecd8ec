//! Codec error type.

use thiserror::Error;

/// Errors raised while decoding or encoding a body.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The body was not valid JSON for the expected shape.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    /// The body was not a valid protobuf frame.
    #[error("invalid protobuf body: {0}")]
    Decode(#[from] prost::DecodeError),
    /// A protobuf frame could not be written.
    #[error("failed to encode protobuf body: {0}")]
    Encode(#[from] prost::EncodeError),
    /// The request named no method.
    #[error("request has no method")]
    MissingMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_display() {
        let err: CodecError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("invalid JSON body"));
    }

    #[test]
    fn missing_method_display() {
        assert_eq!(CodecError::MissingMethod.to_string(), "request has no method");
    }
}

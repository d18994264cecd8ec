//! RPC error codes and error type.

use serde::{Deserialize, Serialize};

// ── Error code constants ────────────────────────────────────────────

/// Request body could not be decoded by the selected codec.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
/// Invalid or missing parameters.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Resource or feature not available.
pub const NOT_AVAILABLE: &str = "NOT_AVAILABLE";

/// RPC error type returned by handlers and by dispatch.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The request body was malformed.
    #[error("{message}")]
    InvalidRequest {
        /// Description of what is wrong.
        message: String,
    },

    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// No registered method matches the requested name.
    #[error("Method '{method}' not found")]
    MethodNotFound {
        /// The requested `Service.Method` name.
        method: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// Feature or resource not available.
    #[error("{message}")]
    NotAvailable {
        /// Description.
        message: String,
    },

    /// Domain-specific error with arbitrary code.
    #[error("{message}")]
    Custom {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidRequest { .. } => INVALID_REQUEST,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::NotAvailable { .. } => NOT_AVAILABLE,
            Self::Custom { code, .. } => code,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}

/// Structured error carried inside a response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. `METHOD_NOT_FOUND`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl From<ErrorBody> for RpcError {
    fn from(body: ErrorBody) -> Self {
        Self::Custom {
            code: body.code,
            message: body.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_params_code() {
        let err = RpcError::InvalidParams { message: "bad".into() };
        assert_eq!(err.code(), INVALID_PARAMS);
        assert_eq!(err.to_string(), "bad");
    }

    #[test]
    fn method_not_found_message_names_method() {
        let err = RpcError::MethodNotFound {
            method: "Echo.Nope".into(),
        };
        assert_eq!(err.code(), METHOD_NOT_FOUND);
        assert!(err.to_string().contains("Echo.Nope"));
    }

    #[test]
    fn internal_code() {
        let err = RpcError::Internal { message: "boom".into() };
        assert_eq!(err.code(), INTERNAL_ERROR);
    }

    #[test]
    fn custom_code_in_error_body() {
        let err = RpcError::Custom {
            code: "QUOTA_EXCEEDED".into(),
            message: "slow down".into(),
        };
        let body = err.to_error_body();
        assert_eq!(body.code, "QUOTA_EXCEEDED");
        assert_eq!(body.message, "slow down");
    }

    #[test]
    fn error_body_converts_back_to_custom() {
        let body = RpcError::NotAvailable { message: "nope".into() }.to_error_body();
        let err = RpcError::from(body);
        assert_eq!(err.code(), NOT_AVAILABLE);
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn error_body_serde_shape() {
        let body = RpcError::InvalidRequest {
            message: "garbage".into(),
        }
        .to_error_body();
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["code"], "INVALID_REQUEST");
        assert_eq!(v["message"], "garbage");
    }
}

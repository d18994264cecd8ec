//! Error types for transport operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding, accepting, dialing or exchanging messages.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listener could not bind the requested address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Requested address.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A client connection could not be opened.
    #[error("failed to connect to {address}: {source}")]
    Dial {
        /// Requested address.
        address: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Nothing is listening on the requested in-memory address.
    #[error("no listener at {address}")]
    NoListener {
        /// Requested address.
        address: String,
    },
    /// Another listener already owns the in-memory address.
    #[error("address {address} already in use")]
    AddressInUse {
        /// Requested address.
        address: String,
    },
    /// The listener has been closed.
    #[error("listener closed")]
    Closed,
    /// The peer went away before a whole message was exchanged.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// Socket I/O failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// A message header frame was not a JSON string map.
    #[error("malformed message header: {0}")]
    Header(#[from] serde_json::Error),
}

impl TransportError {
    /// Whether this error reports a closed listener.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_is_closed() {
        assert!(TransportError::Closed.is_closed());
        assert!(!TransportError::ConnectionClosed.is_closed());
    }

    #[test]
    fn bind_error_display_names_address() {
        let err = TransportError::Bind {
            address: "127.0.0.1:1".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:1"));
        assert!(text.contains("in use"));
    }

    #[test]
    fn io_error_from_conversion() {
        let err: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, TransportError::Io(_)));
    }
}

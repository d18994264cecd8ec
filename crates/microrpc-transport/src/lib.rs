//! # microrpc-transport
//!
//! Connection accept/send/receive primitives the RPC server is written against.
//!
//! - [`Transport`]: binds listeners and dials remote endpoints
//! - [`Listener`]: yields accepted [`Socket`]s until closed
//! - [`Socket`]: exchanges whole [`Message`]s
//!
//! Two implementations ship with the crate: [`TcpTransport`] (length-delimited
//! frames over TCP, the default) and [`MemoryTransport`] (in-process channels).

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod tcp;

use std::sync::Arc;

use async_trait::async_trait;
use microrpc_core::Message;

pub use errors::TransportError;
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;

/// A network substrate that can listen for and open connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Bind a listener. An empty address selects the transport default.
    async fn listen(&self, address: &str) -> Result<Arc<dyn Listener>, TransportError>;

    /// Open a client connection to a listening address.
    async fn dial(&self, address: &str) -> Result<Box<dyn Socket>, TransportError>;
}

/// A bound listener.
///
/// Shared between the accept loop and whoever closes it, so every method
/// takes `&self`.
#[async_trait]
pub trait Listener: Send + Sync {
    /// The resolved address the listener is bound to.
    fn addr(&self) -> String;

    /// Wait for the next connection.
    ///
    /// Returns [`TransportError::Closed`] once [`Listener::close`] has been
    /// called, including for an `accept` that was already pending.
    async fn accept(&self) -> Result<Box<dyn Socket>, TransportError>;

    /// Stop accepting connections. A second call returns
    /// [`TransportError::Closed`].
    async fn close(&self) -> Result<(), TransportError>;
}

/// One accepted or dialed connection.
#[async_trait]
pub trait Socket: Send {
    /// Receive one whole message.
    async fn recv(&mut self) -> Result<Message, TransportError>;

    /// Send one whole message.
    async fn send(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Address of the peer, for logs.
    fn remote_addr(&self) -> String;
}

/// The transport used when none is configured.
pub fn default_transport() -> Arc<dyn Transport> {
    Arc::new(TcpTransport::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transport_is_tcp() {
        assert_eq!(default_transport().name(), "tcp");
    }
}

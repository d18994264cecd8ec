//! Functional options applied when the server is constructed.
//!
//! ```ignore
//! let server = RpcServer::new([
//!     options::address("127.0.0.1:9000"),
//!     options::health_path("/healthz"),
//! ]);
//! ```

use std::sync::Arc;

use microrpc_codec::{Codec, CodecSelector};
use microrpc_transport::{Transport, default_transport};

use crate::config::ServerConfig;

/// A single configuration step.
pub type ServerOption = Box<dyn FnOnce(&mut Options) + Send>;

/// Resolved server options. Immutable once the server is built.
#[derive(Clone)]
pub struct Options {
    address: String,
    transport: Arc<dyn Transport>,
    codecs: CodecSelector,
    health_service: String,
    health_path: String,
}

impl Options {
    /// Options seeded from a [`ServerConfig`], with the default transport
    /// and codecs.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            address: config.address.clone(),
            transport: default_transport(),
            codecs: CodecSelector::default(),
            health_service: config.health_service.clone(),
            health_path: config.health_path.clone(),
        }
    }

    /// Apply options in order.
    #[must_use]
    pub fn apply(mut self, options: impl IntoIterator<Item = ServerOption>) -> Self {
        for option in options {
            option(&mut self);
        }
        self
    }

    /// Address to listen on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Transport used to listen.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Known codecs.
    pub fn codecs(&self) -> &CodecSelector {
        &self.codecs
    }

    /// Service name of the health receiver.
    pub fn health_service(&self) -> &str {
        &self.health_service
    }

    /// Route alias for the health method.
    pub fn health_path(&self) -> &str {
        &self.health_path
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("address", &self.address)
            .field("transport", &self.transport.name())
            .field("codecs", &self.codecs)
            .field("health_service", &self.health_service)
            .field("health_path", &self.health_path)
            .finish()
    }
}

/// Listen on `address` instead of the transport default.
pub fn address(address: impl Into<String>) -> ServerOption {
    let address = address.into();
    Box::new(move |o| o.address = address)
}

/// Use `transport` instead of TCP.
pub fn transport(transport: Arc<dyn Transport>) -> ServerOption {
    Box::new(move |o| o.transport = transport)
}

/// Register an extra codec (replacing any codec for the same content type).
pub fn codec(codec: Arc<dyn Codec>) -> ServerOption {
    Box::new(move |o| {
        let _ = o.codecs.register(codec);
    })
}

/// Service name of the health receiver.
pub fn health_service(name: impl Into<String>) -> ServerOption {
    let name = name.into();
    Box::new(move |o| o.health_service = name)
}

/// Route alias for the health method.
pub fn health_path(path: impl Into<String>) -> ServerOption {
    let path = path.into();
    Box::new(move |o| o.health_path = path)
}

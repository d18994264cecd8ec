//! Server, registration and configuration error types.

use std::sync::Arc;

use microrpc_transport::TransportError;
use thiserror::Error;

/// Errors returned by the server lifecycle.
///
/// `Clone` so a recorded stop outcome can be handed to every caller of
/// [`crate::RpcServer::stop`]; transport failures are shared behind an `Arc`.
#[derive(Clone, Debug, Error)]
pub enum ServerError {
    /// The transport could not bind the configured address.
    #[error("failed to start listener: {0}")]
    Bind(Arc<TransportError>),
    /// Closing the listener failed.
    #[error("failed to close listener: {0}")]
    Close(Arc<TransportError>),
    /// The built-in health receiver could not be registered.
    #[error("failed to register health receiver: {0}")]
    Register(#[from] RegisterError),
    /// `start` was called on a server that is starting or running.
    #[error("server already started")]
    AlreadyStarted,
    /// `start` was called after the server was stopped.
    #[error("server has been stopped")]
    Stopped,
    /// `stop` was called before `start`.
    #[error("server not started")]
    NotStarted,
    /// The shutdown task went away without reporting a result.
    #[error("shutdown interrupted before the listener reported closure")]
    ShutdownInterrupted,
}

/// Errors returned when binding a receiver into the registry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The service or a method name is empty or contains `.`.
    #[error("invalid name '{name}': names must be non-empty and must not contain '.'")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
    /// A route alias is empty or contains `.`.
    #[error("invalid route '{alias}': aliases must be non-empty and must not contain '.'")]
    InvalidRoute {
        /// The rejected alias.
        alias: String,
    },
    /// The handler exposes no methods.
    #[error("receiver '{service}' has no methods")]
    NoMethods {
        /// Service name the receiver was registered under.
        service: String,
    },
}

/// Errors raised while loading [`crate::ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file from disk.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in the config file.
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

//! # microrpc-server
//!
//! Embeddable RPC server. Services register [`Handler`] objects; remote
//! callers reach their methods over any [`microrpc_transport::Transport`],
//! in any wire format the [`microrpc_codec::CodecSelector`] knows.
//!
//! - **Lifecycle**: [`RpcServer`] (`start` / `stop` / `address`)
//! - **Dispatch**: [`ConnectionDispatcher`], one request per connection
//! - **Registry**: [`MethodRegistry`], `Service.Method` and route aliases
//! - **Handlers**: [`Handler`], [`MethodTable`], [`Receiver`]
//! - **Configuration**: [`ServerConfig`] and functional [`options`]
//! - **Health**: the built-in `Debug.Health` receiver

#![deny(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handler;
pub mod health;
pub mod metrics;
pub mod options;
pub mod registry;
pub mod server;

pub use config::{ServerConfig, load_config_from_path};
pub use dispatcher::ConnectionDispatcher;
pub use errors::{ConfigError, RegisterError, ServerError};
pub use handler::{Handler, MethodHandler, MethodTable, Receiver};
pub use health::HealthResponse;
pub use options::{Options, ServerOption};
pub use registry::MethodRegistry;
pub use server::{RpcServer, ServerState};

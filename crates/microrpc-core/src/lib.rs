//! # microrpc-core
//!
//! Shared vocabulary for the microrpc crates:
//!
//! - **Messages**: [`Message`], the transport envelope (string headers + opaque body)
//! - **Request context**: [`Metadata`] and [`RequestContext`], the per-request
//!   header map handed to handlers
//! - **Errors**: [`RpcError`] with machine-readable codes and its wire body [`ErrorBody`]
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;
pub mod message;
pub mod metadata;

pub use errors::{ErrorBody, RpcError};
pub use message::{CONTENT_TYPE, Message};
pub use metadata::{Metadata, RequestContext};

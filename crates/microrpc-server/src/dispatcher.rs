//! Per-connection request handling.
//!
//! Each accepted connection carries exactly one request: receive, select the
//! codec from `Content-Type`, decode, dispatch, encode, send. Failures before
//! a codec is selected drop the connection without a reply; afterwards every
//! failure becomes an error response in the selected format.

use std::sync::Arc;

use metrics::counter;
use microrpc_codec::{Buffer, CodecSelector, Response, ServerCodec};
use microrpc_core::{CONTENT_TYPE, Message, RequestContext, RpcError};
use microrpc_transport::Socket;
use serde_json::Value;
use tracing::{Span, debug, instrument, warn};

use crate::metrics::{RPC_CONNECTIONS_DROPPED_TOTAL, RPC_ERRORS_TOTAL};
use crate::registry::MethodRegistry;

/// Serves single-request connections against a registry.
#[derive(Clone)]
pub struct ConnectionDispatcher {
    registry: Arc<MethodRegistry>,
    codecs: CodecSelector,
}

impl ConnectionDispatcher {
    /// Create a dispatcher.
    pub fn new(registry: Arc<MethodRegistry>, codecs: CodecSelector) -> Self {
        Self { registry, codecs }
    }

    /// Run one receive/dispatch/send cycle, then drop the connection.
    pub async fn serve(&self, mut socket: Box<dyn Socket>) {
        let remote = socket.remote_addr();

        let mut message = match socket.recv().await {
            Ok(message) => message,
            Err(err) => {
                debug!(%remote, error = %err, "receive failed, dropping connection");
                counter!(RPC_CONNECTIONS_DROPPED_TOTAL, "reason" => "receive").increment(1);
                return;
            }
        };

        let Some(content_type) = message.take_content_type() else {
            debug!(%remote, "missing content type, dropping connection");
            counter!(RPC_CONNECTIONS_DROPPED_TOTAL, "reason" => "content_type").increment(1);
            return;
        };
        let Some(codec) = self.codecs.select(&content_type) else {
            debug!(%remote, content_type, "unsupported content type, dropping connection");
            counter!(RPC_CONNECTIONS_DROPPED_TOTAL, "reason" => "content_type").increment(1);
            return;
        };

        let ctx = RequestContext::background().with_metadata(std::mem::take(&mut message.header));
        let mut server_codec = codec.new_server_codec(Buffer::new(message.body));

        let response = self.handle(server_codec.as_mut(), &ctx).await;

        if let Err(err) = server_codec.write_response(&response) {
            warn!(%remote, error = %err, "failed to encode response, dropping connection");
            counter!(RPC_CONNECTIONS_DROPPED_TOTAL, "reason" => "encode").increment(1);
            return;
        }

        let reply = Message::new(server_codec.into_body()).with_header(CONTENT_TYPE, content_type);
        if let Err(err) = socket.send(&reply).await {
            debug!(%remote, error = %err, "failed to send response");
            counter!(RPC_CONNECTIONS_DROPPED_TOTAL, "reason" => "send").increment(1);
        }
    }

    #[instrument(skip_all, fields(method))]
    async fn handle(&self, codec: &mut dyn ServerCodec, ctx: &RequestContext) -> Response {
        match codec.read_request() {
            Ok(request) => {
                let _ = Span::current().record("method", request.method.as_str());
                self.registry.dispatch(request, ctx).await
            }
            Err(err) => {
                debug!(error = %err, "undecodable request");
                counter!(RPC_ERRORS_TOTAL, "method" => "", "error_type" => "invalid_request").increment(1);
                Response::error(
                    Value::Null,
                    &RpcError::InvalidRequest {
                        message: err.to_string(),
                    },
                )
            }
        }
    }
}

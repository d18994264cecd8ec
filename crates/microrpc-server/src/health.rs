//! Built-in health receiver.

use std::sync::Arc;
use std::time::Instant;

use microrpc_core::RpcError;
use serde::Serialize;
use serde_json::Value;

use crate::handler::{Handler, MethodTable};

/// Method name of the health check.
pub const HEALTH_METHOD: &str = "Health";

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

/// Build a health response.
pub fn health_check(start_time: Instant) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

/// Handler exposing [`HEALTH_METHOD`]. Accepts any params.
pub struct HealthHandler {
    started: Instant,
}

impl HealthHandler {
    /// Create a handler reporting uptime from `started`.
    pub fn new(started: Instant) -> Self {
        Self { started }
    }
}

impl Handler for HealthHandler {
    fn methods(self: Arc<Self>) -> MethodTable {
        let started = self.started;
        MethodTable::new().method(HEALTH_METHOD, move |_ctx, _: Value| async move {
            Ok::<_, RpcError>(health_check(started))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Receiver;
    use crate::registry::MethodRegistry;
    use microrpc_codec::Request;
    use microrpc_core::RequestContext;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now());
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        assert!(health_check(start).uptime_secs >= 59);
    }

    #[tokio::test]
    async fn registered_handler_answers_via_route() {
        let reg = MethodRegistry::new();
        let handler = Arc::new(HealthHandler::new(Instant::now()));
        let _ = reg.register(&Receiver::named("Debug", handler)).unwrap();
        reg.add_route("/_status/health", "Debug.Health").unwrap();

        let resp = reg
            .dispatch(
                Request::new(1, "/_status/health", Value::Null),
                &RequestContext::background(),
            )
            .await;
        let body = resp.into_result().unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["uptime_secs"].is_u64());
    }
}

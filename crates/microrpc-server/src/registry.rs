//! Service registry and async dispatch.
//!
//! Methods are addressed as `Service.Method` (split on the last `.`) or by
//! an exact route alias such as `/_status/health`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use microrpc_codec::{Request, Response};
use microrpc_core::{RequestContext, RpcError};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::RegisterError;
use crate::handler::{MethodHandler, Receiver};
use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL};

/// Handlers slower than this are logged at `warn`.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(5);

type MethodMap = BTreeMap<String, Arc<dyn MethodHandler>>;

/// Registry mapping service names to their method tables.
///
/// Internally locked; registration while serving is safe, but an in-flight
/// dispatch may resolve against the previous table.
#[derive(Default)]
pub struct MethodRegistry {
    services: RwLock<HashMap<String, MethodMap>>,
    routes: RwLock<HashMap<String, String>>,
}

fn validate_name(name: &str) -> Result<(), RegisterError> {
    if name.is_empty() || name.contains('.') {
        return Err(RegisterError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a receiver's methods under its service name, returning that name.
    ///
    /// A receiver registered under a name that already exists replaces the
    /// previous service's whole method set.
    pub fn register(&self, receiver: &Receiver) -> Result<String, RegisterError> {
        let service = receiver.name();
        validate_name(&service)?;

        let table = receiver.methods();
        if table.is_empty() {
            return Err(RegisterError::NoMethods { service });
        }
        for method in table.names() {
            validate_name(method)?;
        }

        let methods = table.into_methods();
        let count = methods.len();
        let replaced = self
            .services
            .write()
            .insert(service.clone(), methods)
            .is_some();
        if replaced {
            debug!(service, methods = count, "replaced existing service");
        } else {
            debug!(service, methods = count, "registered service");
        }
        Ok(service)
    }

    /// Route an exact name (e.g. a path) to a `Service.Method` target.
    ///
    /// The target is resolved at dispatch time, so the route may be added
    /// before the service is registered. Aliases may not contain `.`, so a
    /// route never shadows a `Service.Method` name.
    pub fn add_route(
        &self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), RegisterError> {
        let alias = alias.into();
        if alias.is_empty() || alias.contains('.') {
            return Err(RegisterError::InvalidRoute { alias });
        }
        let _ = self.routes.write().insert(alias, target.into());
        Ok(())
    }

    /// Resolve a method name or route alias to its handler.
    pub fn resolve(&self, method: &str) -> Option<Arc<dyn MethodHandler>> {
        let routed = self.routes.read().get(method).cloned();
        let target = routed.as_deref().unwrap_or(method);
        let (service, name) = target.rsplit_once('.')?;
        self.services.read().get(service)?.get(name).cloned()
    }

    /// Dispatch a decoded request to its handler.
    pub async fn dispatch(&self, request: Request, ctx: &RequestContext) -> Response {
        let method = request.method;
        counter!(RPC_REQUESTS_TOTAL, "method" => method.clone()).increment(1);

        let Some(handler) = self.resolve(&method) else {
            counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => "method_not_found").increment(1);
            return Response::error(request.id, &RpcError::MethodNotFound { method });
        };

        let start = Instant::now();
        let result = handler.handle(request.params, ctx).await;

        let response = match result {
            Ok(result) => Response::success(request.id, result),
            Err(err) => {
                counter!(RPC_ERRORS_TOTAL, "method" => method.clone(), "error_type" => err.code().to_owned()).increment(1);
                Response::error(request.id, &err)
            }
        };

        let duration = start.elapsed();
        histogram!(RPC_REQUEST_DURATION_SECONDS, "method" => method.clone())
            .record(duration.as_secs_f64());

        if duration >= SLOW_REQUEST_THRESHOLD {
            warn!(
                method,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        response
    }

    /// All registered `Service.Method` names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let services = self.services.read();
        let mut names: Vec<String> = services
            .iter()
            .flat_map(|(service, methods)| {
                methods.keys().map(move |method| format!("{service}.{method}"))
            })
            .collect();
        names.sort();
        names
    }

    /// All registered service names (sorted).
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a method name or route alias resolves.
    pub fn has_method(&self, method: &str) -> bool {
        self.resolve(method).is_some()
    }
}

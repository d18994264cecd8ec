//! Metric names recorded through the `metrics` facade.
//!
//! The library installs no recorder; embedders choose their own exporter.

/// RPC requests total (counter, labels: method).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// RPC errors total (counter, labels: method, error_type).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC request duration seconds (histogram, labels: method).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// Connections accepted total (counter).
pub const RPC_CONNECTIONS_TOTAL: &str = "rpc_connections_total";
/// Connections dropped without a response (counter, labels: reason).
pub const RPC_CONNECTIONS_DROPPED_TOTAL: &str = "rpc_connections_dropped_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_snake_case() {
        let names = [
            RPC_REQUESTS_TOTAL,
            RPC_ERRORS_TOTAL,
            RPC_REQUEST_DURATION_SECONDS,
            RPC_CONNECTIONS_TOTAL,
            RPC_CONNECTIONS_DROPPED_TOTAL,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        for name in names {
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}

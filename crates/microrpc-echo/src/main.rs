//! # microrpc-echo
//!
//! Serves an `Echo` service over TCP until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use microrpc_core::{RequestContext, RpcError};
use microrpc_server::config::RejectedOverride;
use microrpc_server::{Handler, MethodTable, RpcServer, ServerConfig, config};
use serde_json::{Value, json};
use tracing::{info, warn};

/// Echo service over microrpc.
#[derive(Parser, Debug)]
#[command(name = "microrpc-echo", about = "Echo service over microrpc")]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config).
    #[arg(long)]
    address: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    /// Human-readable single lines.
    Compact,
    /// One JSON object per line.
    Json,
}

/// Returns its argument and the request metadata.
struct Echo;

impl Handler for Echo {
    fn methods(self: Arc<Self>) -> MethodTable {
        MethodTable::new()
            .method("Do", |_ctx, value: Value| async move { Ok::<_, RpcError>(value) })
            .method("Metadata", |ctx: RequestContext, _: Value| async move {
                let metadata: serde_json::Map<String, Value> = ctx
                    .metadata()
                    .iter()
                    .map(|(k, v)| (k.to_owned(), json!(v)))
                    .collect();
                Ok::<_, RpcError>(Value::Object(metadata))
            })
    }
}

/// File config, then env overrides read through `lookup`, then CLI flags.
///
/// Rejected overrides are returned rather than logged because the
/// subscriber is configured from the result.
fn resolve_config(
    cli: &Cli,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(ServerConfig, Vec<RejectedOverride>)> {
    let mut server_config = match &cli.config {
        Some(path) => config::load_config_with_env(path, |_| None)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => ServerConfig::default(),
    };
    let ignored = config::apply_overrides_from(&mut server_config, lookup);
    if let Some(address) = &cli.address {
        server_config.address.clone_from(address);
    }
    Ok((server_config, ignored))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (server_config, ignored) = resolve_config(&cli, |name| std::env::var(name).ok())?;

    match cli.log_format {
        LogFormat::Compact => microrpc_core::logging::init_subscriber(&server_config.log_level),
        LogFormat::Json => microrpc_core::logging::init_json_subscriber(&server_config.log_level),
    }
    for rejected in ignored {
        warn!(key = rejected.key, value = %rejected.value, "{}, ignoring", rejected.reason);
    }

    let server = RpcServer::from_config(&server_config, []);
    server
        .register(&server.new_receiver(Echo))
        .context("Failed to register Echo")?;
    server.start().await.context("Failed to start server")?;
    info!(address = %server.address(), "echo service ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("interrupt received, shutting down");
    server.stop().await.context("Failed to stop server")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_compact() {
        let cli = Cli::try_parse_from(["microrpc-echo"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Compact));
        let cli = Cli::try_parse_from(["microrpc-echo", "--log-format", "json"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn invalid_env_overrides_are_returned_not_applied() {
        let cli = Cli::try_parse_from(["microrpc-echo"]).unwrap();
        let (cfg, ignored) = resolve_config(&cli, |name| {
            (name == "MICRORPC_LOG_LEVEL").then(|| "loud".to_owned())
        })
        .unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(ignored.len(), 1);
        assert_eq!(ignored[0].key, "MICRORPC_LOG_LEVEL");
    }

    #[test]
    fn address_flag_wins_over_env() {
        let cli = Cli::try_parse_from(["microrpc-echo", "--address", "127.0.0.1:9"]).unwrap();
        let (cfg, ignored) = resolve_config(&cli, |name| {
            (name == "MICRORPC_ADDRESS").then(|| "127.0.0.1:8".to_owned())
        })
        .unwrap();
        assert_eq!(cfg.address, "127.0.0.1:9");
        assert!(ignored.is_empty());
    }
}

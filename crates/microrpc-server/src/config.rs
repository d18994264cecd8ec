//! Server configuration and its loader.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a config file exists, deep-merge its values over the defaults
//! 3. Apply `MICRORPC_*` environment overrides (highest priority)

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::ConfigError;

/// Log levels accepted by [`ServerConfig::log_level`].
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the RPC server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on (default `""`, the transport default).
    pub address: String,
    /// Service name of the built-in health receiver.
    pub health_service: String,
    /// Route alias for the health method.
    pub health_path: String,
    /// Default log level for [`microrpc_core::logging::init_subscriber`].
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            health_service: "Debug".into(),
            health_path: "/_status/health".into(),
            log_level: "info".into(),
        }
    }
}

/// Load a config file with process env overrides.
///
/// A missing file yields the defaults; invalid JSON is an error.
pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Load a config file, reading overrides through `lookup`.
pub fn load_config_with_env(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfig, ConfigError> {
    let defaults = serde_json::to_value(ServerConfig::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading server config from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: ServerConfig = serde_json::from_value(merged)?;
    for rejected in apply_overrides_from(&mut config, lookup) {
        warn!(key = rejected.key, value = %rejected.value, "{}, ignoring", rejected.reason);
    }
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, anything else is replaced by `source`, and
/// `null` in `source` keeps the target value.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// An environment override that was read but not applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedOverride {
    /// Environment variable name.
    pub key: &'static str,
    /// The rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Apply overrides read through `lookup`.
///
/// Empty values are skipped; invalid values are left out of `config` and
/// returned so the caller can report them once logging is up.
pub fn apply_overrides_from(
    config: &mut ServerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<RejectedOverride> {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut rejected = Vec::new();

    if let Some(v) = read("MICRORPC_ADDRESS") {
        config.address = v;
    }
    if let Some(v) = read("MICRORPC_HEALTH_SERVICE") {
        if v.contains('.') {
            rejected.push(RejectedOverride {
                key: "MICRORPC_HEALTH_SERVICE",
                value: v,
                reason: "invalid service name env var",
            });
        } else {
            config.health_service = v;
        }
    }
    if let Some(v) = read("MICRORPC_HEALTH_PATH") {
        if v.contains('.') {
            rejected.push(RejectedOverride {
                key: "MICRORPC_HEALTH_PATH",
                value: v,
                reason: "invalid health path env var",
            });
        } else {
            config.health_path = v;
        }
    }
    if let Some(v) = read("MICRORPC_LOG_LEVEL") {
        let level = v.to_ascii_lowercase();
        if LOG_LEVELS.contains(&level.as_str()) {
            config.log_level = level;
        } else {
            rejected.push(RejectedOverride {
                key: "MICRORPC_LOG_LEVEL",
                value: v,
                reason: "invalid log level env var",
            });
        }
    }
    rejected
}

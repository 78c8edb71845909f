// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment-variable configuration, grounded on
//! `ktrdr/managers/base.py::ServiceOrchestrator`'s env-prefixed settings
//! convention.

use std::net::SocketAddr;
use std::time::Duration;

use ops_core::{OpsError, OpsResult};

/// Daemon configuration, loaded once at startup from `OPS_*` environment
/// variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: SocketAddr,
    pub orphan_timeout: Duration,
    pub orphan_check_interval: Duration,
    pub heartbeat_interval: Duration,
    pub max_unreachable: u32,
    pub cleanup_max_age_hours: i64,
    pub cleanup_interval: Duration,
    pub log_format: LogFormat,
    pub host_service_max_connections: usize,
    pub host_service_keepalive: Duration,
    pub host_service_max_connection_age: Duration,
}

/// Output format for the daemon's `tracing` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Loads configuration from the environment. `OPS_DATABASE_URL` is the
    /// only variable without a default; every other setting falls back to a
    /// value tuned for a single-process development deployment.
    pub fn from_env() -> OpsResult<Self> {
        let database_url = std::env::var("OPS_DATABASE_URL")
            .map_err(|_| OpsError::configuration("OPS_DATABASE_URL must be set"))?;

        let http_addr = env_or("OPS_HTTP_ADDR", "0.0.0.0:8080")
            .parse::<SocketAddr>()
            .map_err(|e| OpsError::configuration(format!("invalid OPS_HTTP_ADDR: {e}")))?;

        let log_format = match env_or("OPS_LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => return Err(OpsError::configuration(format!("invalid OPS_LOG_FORMAT: {other} (expected pretty or json)"))),
        };

        Ok(Self {
            database_url,
            http_addr,
            orphan_timeout: Duration::from_secs(env_secs("OPS_ORPHAN_TIMEOUT_SECS", 60)),
            orphan_check_interval: Duration::from_secs(env_secs("OPS_ORPHAN_CHECK_INTERVAL_SECS", 15)),
            heartbeat_interval: Duration::from_secs(env_secs("OPS_HEARTBEAT_INTERVAL_SECS", 10)),
            max_unreachable: env_u32("OPS_MAX_UNREACHABLE", 3),
            cleanup_max_age_hours: env_secs("OPS_CLEANUP_MAX_AGE_HOURS", 168) as i64,
            cleanup_interval: Duration::from_secs(env_secs("OPS_CLEANUP_INTERVAL_SECS", 3600)),
            log_format,
            host_service_max_connections: env_secs("OPS_HOST_SERVICE_MAX_CONNECTIONS", 20) as usize,
            host_service_keepalive: Duration::from_secs(env_secs("OPS_HOST_SERVICE_KEEPALIVE_SECONDS", 3600)),
            host_service_max_connection_age: Duration::from_secs(env_secs("OPS_HOST_SERVICE_MAX_CONNECTION_AGE_SECONDS", 3600)),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "OPS_DATABASE_URL",
            "OPS_HTTP_ADDR",
            "OPS_ORPHAN_TIMEOUT_SECS",
            "OPS_ORPHAN_CHECK_INTERVAL_SECS",
            "OPS_HEARTBEAT_INTERVAL_SECS",
            "OPS_MAX_UNREACHABLE",
            "OPS_CLEANUP_MAX_AGE_HOURS",
            "OPS_CLEANUP_INTERVAL_SECS",
            "OPS_LOG_FORMAT",
            "OPS_HOST_SERVICE_MAX_CONNECTIONS",
            "OPS_HOST_SERVICE_KEEPALIVE_SECONDS",
            "OPS_HOST_SERVICE_MAX_CONNECTION_AGE_SECONDS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn missing_database_url_is_a_configuration_error() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, OpsError::Configuration(_)));
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_database_url_is_set() {
        clear_env();
        std::env::set_var("OPS_DATABASE_URL", "postgres://localhost/ops");
        let config = Config::from_env().unwrap();
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.orphan_timeout, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.host_service_max_connections, 20);
        std::env::remove_var("OPS_DATABASE_URL");
    }

    #[test]
    #[serial]
    fn unrecognized_log_format_is_a_configuration_error() {
        clear_env();
        std::env::set_var("OPS_DATABASE_URL", "postgres://localhost/ops");
        std::env::set_var("OPS_LOG_FORMAT", "xml");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, OpsError::Configuration(_)));
        std::env::remove_var("OPS_DATABASE_URL");
        std::env::remove_var("OPS_LOG_FORMAT");
    }
}

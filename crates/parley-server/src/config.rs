//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::time::Duration;

use parley_core::reaper::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"parley"`
    pub instance_name: String,

    /// How long a session may be inactive before the reaper marks it
    /// offline.
    /// Env: `IDLE_TIMEOUT_SECS`
    /// Default: 10
    pub idle_timeout: Duration,

    /// How often the reaper sweeps the session registry.
    /// Env: `SWEEP_INTERVAL_SECS`
    /// Default: 1
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            instance_name: "parley".to_string(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("IDLE_TIMEOUT_SECS") {
            match parse_secs(&val) {
                Some(d) => config.idle_timeout = d,
                None => {
                    tracing::warn!(value = %val, "Invalid IDLE_TIMEOUT_SECS, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("SWEEP_INTERVAL_SECS") {
            match parse_secs(&val) {
                Some(d) => config.sweep_interval = d,
                None => {
                    tracing::warn!(value = %val, "Invalid SWEEP_INTERVAL_SECS, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a positive whole number of seconds.
fn parse_secs(value: &str) -> Option<Duration> {
    let secs: u64 = value.trim().parse().ok()?;
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}

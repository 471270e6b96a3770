//! # parley-server
//!
//! In-memory chat backend over HTTP.
//!
//! This binary provides:
//! - **Session registry**: POST /login issues an opaque token, DELETE
//!   /logout revokes it; usernames are unique across all live sessions
//! - **Presence tracking**: every authenticated request refreshes the
//!   caller's activity time; a background reaper marks idle sessions offline
//! - **Message log**: POST /messages appends, GET /messages pages through
//!   the append-ordered sequence
//!
//! All state lives in memory and is lost on restart.

mod api;
mod config;
mod error;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use parley_core::{spawn_reaper, MessageLog, SessionRegistry};

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug")),
        )
        .init();

    info!("Starting parley chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems and spawn the inactivity reaper
    // -----------------------------------------------------------------------
    let registry = SessionRegistry::new();
    let log = MessageLog::new();

    let reaper = spawn_reaper(registry.clone(), config.idle_timeout, config.sweep_interval);
    info!(
        idle_timeout = ?config.idle_timeout,
        sweep_interval = ?config.sweep_interval,
        "Inactivity reaper running in background"
    );

    let http_addr = config.http_addr;
    let state = AppState {
        registry,
        log,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                reaper.shutdown().await;
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    reaper.shutdown().await;
    Ok(())
}

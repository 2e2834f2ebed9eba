//! Main entrypoint for the protocol translation proxy.
//!
//! 1. Load configuration from the environment.
//! 2. Initialize logging.
//! 3. Build the Axum router with the single WebSocket route.
//! 4. Start the server and handle graceful shutdown.

use agent_realtime_proxy::config::Config;
use agent_realtime_proxy::ws_handler;
use anyhow::Context;
use axum::{Router, routing::get};
use std::sync::Arc;
use tracing::info;

/// Listens for the `Ctrl+C` signal to shut down the server gracefully.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded.");

    let listen_path = config.listen_path.clone();
    let listen_address = config.listen_address;
    let app_state = Arc::new(config);

    let app = Router::new()
        .route(&listen_path, get(ws_handler))
        .with_state(app_state);

    info!(address = %listen_address, path = %listen_path, "Starting server...");
    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .with_context(|| format!("Failed to bind {listen_address}"))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server has shut down.");
    Ok(())
}

// Main entry point - Dependency injection, control loop and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::controller::SkidController;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::device_client::HttpDeviceClient;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let app_config = load_app_config()?;

    // Create device gateway (infrastructure layer)
    let gateway = Arc::new(HttpDeviceClient::new(
        &app_config.device.base_url,
        Duration::from_millis(app_config.device.timeout_ms),
    )?);

    // Create controller (application layer)
    let controller = Arc::new(SkidController::new(gateway, app_config.controller_settings())?);

    // Start the control loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let control_loop = tokio::spawn(controller.clone().run(shutdown_rx));

    // Build router (presentation layer)
    let state = Arc::new(AppState { controller });
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = app_config.server.bind.parse()?;
    tracing::info!(
        "Starting skid-supervisor on {} (device {})",
        addr,
        app_config.device.base_url
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop polling; an in-flight poll drains and is discarded
    let _ = shutdown_tx.send(true);
    control_loop.await?;
    tracing::info!("skid-supervisor stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}

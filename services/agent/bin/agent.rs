//! Main Entrypoint for the LivePersona Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Building the session runner and job registry.
//! 4. Serving the job dispatch endpoints until shutdown.

use anyhow::Context;
use livepersona_agent::{
    config::AgentConfig,
    dispatch::JobRegistry,
    router::create_router,
    session::LiveSessionRunner,
    state::AppState,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = AgentConfig::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing agent...");

    // --- 3. Initialize Shared State ---
    let config = Arc::new(config);
    let app_state = Arc::new(AppState {
        config: config.clone(),
        jobs: JobRegistry::default(),
        runner: Arc::new(LiveSessionRunner::new(config.clone())),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(app_state).layer(cors);

    // --- 4. Start Server ---
    info!(
        livekit_url = %config.livekit_url,
        identity = %config.agent_identity,
        bind_address = %config.bind_address,
        "Agent configured. Waiting for jobs..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Agent has shut down.");
    Ok(())
}

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod gate;
mod models;
mod repositories;
mod routes;
mod service;
mod state;
mod validation;

use tokio::net::TcpListener;

use crate::{config::TimerConfig, service::SessionService, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting timer service");

    let config = TimerConfig::load()?;

    // Initialize the session store and extension gate
    let session_service = SessionService::connect(&config.session_service_config()).await?;

    if session_service.health_check().await? {
        info!("Session store reachable");
    } else {
        anyhow::bail!("Session store health check failed");
    }

    info!(
        gated = session_service.is_gated(),
        "Timer service initialized successfully"
    );

    // Start the web server
    let app = routes::create_router(AppState::new(session_service));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Timer service listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down timer service");
}

//! Main entry point for the authentication API server.
//!
//! Loads configuration, opens the database, wires the authentication
//! service and serves the router until Ctrl+C.

use anyhow::{Context, Result};
use authapi::{
    app, auth::AuthService, config::Config, database::Database,
    utils::rate_limit::FixedWindowRateLimiter,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;

    let service = Arc::new(AuthService::from_config(&config, db.pool().clone()));
    let limiter = Arc::new(FixedWindowRateLimiter::per_minute(config.rate_limit_per_minute));
    let router = app(service, limiter);

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    info!("Starting authapi server on port {}", config.server_port);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

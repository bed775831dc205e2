//! Hookrelay Server - disposable HTTP request capture endpoints
//!
//! This server handles:
//! - Capturing any request sent to `/to/{endpoint}`
//! - Persisting captured requests to SQLite with a retention window
//! - Pushing each capture to live WebSocket viewers of that endpoint
//! - Request history search and diagnostics over JSON

mod abuse;
mod capture;
mod config;
mod db;
mod directory;
mod names;
mod query;
mod relay;
mod retention;
mod routes;

use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hookrelay_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Hookrelay server on {}", config.bind_addr());
    tracing::info!(
        "Retention: {:?}, sweep every {:?}, production: {}",
        config.retention_window,
        config.sweep_interval,
        config.is_production
    );

    // Initialize database
    tracing::info!("Opening database...");
    let db_pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Running database migrations...");
    db::run_migrations(&db_pool).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = retention::spawn_sweeper(
        db_pool.clone(),
        config.retention_window,
        config.sweep_interval,
        shutdown_rx,
    );

    let bind_addr = config.bind_addr();
    let state = routes::AppState::new(config, db_pool.clone());
    abuse::spawn_cleanup(state.rate_limiter.clone());

    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!("Retention sweeper ended abnormally: {}", e);
    }
    db_pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

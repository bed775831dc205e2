//! Route handlers for the Hookrelay server

pub mod api;
pub mod capture;
pub mod pages;
pub mod viewer;

use crate::abuse::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use crate::capture::CaptureService;
use crate::config::Config;
use crate::directory::ConnectionDirectory;
use crate::query::QueryService;
use crate::relay::Relay;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use hookrelay_common::constants;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: SqlitePool,
    /// Live viewers: endpoint -> connections
    pub directory: Arc<ConnectionDirectory>,
    pub capture: CaptureService,
    pub query: QueryService,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        let directory = Arc::new(ConnectionDirectory::new());
        let relay = Relay::new(directory.clone());
        let capture = CaptureService::new(db.clone(), relay);
        let query = QueryService::new(db.clone(), directory.clone(), config.max_query_limit);
        let rate_limiter = RateLimiter::new(RateLimitConfig::new(
            config.rate_limit_max,
            config.rate_limit_window,
        ));

        Self {
            config: Arc::new(config),
            db,
            directory,
            capture,
            query,
            rate_limiter,
        }
    }
}

/// Build the public router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(capture::router())
        .merge(viewer::router())
        .merge(api::router())
        .merge(pages::router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Client address, taken from `X-Forwarded-For` only behind a trusted proxy
pub fn client_ip(config: &Config, headers: &HeaderMap, peer: SocketAddr) -> String {
    if config.trust_proxy {
        let forwarded = headers
            .get(constants::FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.ip().to_string()
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_status = sqlx::query("SELECT 1")
        .fetch_one(&state.db)
        .await
        .map(|_| "ok")
        .unwrap_or("error");

    let status = if db_status == "ok" { "healthy" } else { "degraded" };

    axum::Json(serde_json::json!({
        "status": status,
        "db": db_status,
        "viewers": state.directory.connection_count(),
    }))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

//! Capture handler - records any request sent to `/to/{endpoint}`

use crate::capture::InboundRequest;
use crate::routes::{client_ip, AppState};
use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hookrelay_common::HeaderDocument;
use http_body_util::LengthLimitError;
use std::net::SocketAddr;

/// Build the capture router.
///
/// Everything below `/to/` is captured: `/to/abc`, `/to/abc/` and
/// `/to/abc/deeper/path` all belong to endpoint `abc`.
pub fn router() -> Router<AppState> {
    Router::new().route("/to/{*target}", any(handle_capture))
}

/// First segment of the captured tail
fn endpoint_of(target: &str) -> Option<&str> {
    target.split('/').next().filter(|endpoint| !endpoint.is_empty())
}

/// Record an inbound request and relay it to the endpoint's viewers
async fn handle_capture(
    State(state): State<AppState>,
    Path(target): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let endpoint_id = match endpoint_of(&target) {
        Some(endpoint) => endpoint.to_string(),
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    let source_ip = client_ip(&state.config, request.headers(), peer);
    let (parts, body) = request.into_parts();

    // Collect body
    let body_bytes = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => {
            let too_large = std::error::Error::source(&e)
                .map(|source| source.is::<LengthLimitError>())
                .unwrap_or(false);
            if too_large {
                tracing::warn!("Body for endpoint {} exceeds {} bytes", endpoint_id, state.config.max_body_bytes);
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
            tracing::error!("Failed to read request body: {}", e);
            return (StatusCode::BAD_REQUEST, "Failed to read body").into_response();
        }
    };

    let headers: HeaderDocument = parts
        .headers
        .iter()
        .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes())))
        .fold(HeaderDocument::new(), |mut doc, (name, value)| {
            doc.append(name, value);
            doc
        });

    let inbound = InboundRequest {
        endpoint_id,
        method: parts.method.to_string(),
        path: parts
            .uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        source_ip,
        body: String::from_utf8_lossy(&body_bytes).into_owned(),
        headers,
    };

    match state.capture.capture(inbound).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!("Capture failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

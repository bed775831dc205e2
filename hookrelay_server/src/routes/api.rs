//! JSON API: request history and diagnostics

use crate::query::HistoryParams;
use crate::routes::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::Host;
use hookrelay_common::CapturedRequest;
use serde::Serialize;

/// Build the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/endpoints/{endpoint}/requests", get(get_requests))
        .route("/api/debug", get(get_debug))
}

#[derive(Serialize)]
struct RequestsResponse {
    requests: Vec<CapturedRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DebugResponse {
    host: String,
    is_production: bool,
    requests: i64,
    sockets: usize,
    endpoints: usize,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn internal_error(message: &str) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// History for one endpoint, newest first
async fn get_requests(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => {
            tracing::debug!("Bad history query for {}: {}", endpoint_id, e);
            return json_error(StatusCode::BAD_REQUEST, &e.body_text());
        }
    };

    match state.query.history(&endpoint_id, &params).await {
        Ok(requests) => Json(RequestsResponse { requests }).into_response(),
        Err(e) => {
            tracing::error!("History query for {} failed: {}", endpoint_id, e);
            internal_error("Failed to load requests")
        }
    }
}

/// Aggregate counts
async fn get_debug(State(state): State<AppState>, Host(host): Host) -> Response {
    match state.query.counts().await {
        Ok(counts) => Json(DebugResponse {
            host,
            is_production: state.config.is_production,
            requests: counts.requests,
            sockets: counts.sockets,
            endpoints: counts.endpoints,
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Debug counts failed: {}", e);
            internal_error("Failed to load counts")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::db::{queries, test_support::sample_request};
    use crate::routes::test_support::*;
    use axum::{body::Body, http::Request, http::StatusCode};
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_history_endpoint() {
        let state = test_state(Config::default()).await;
        let now = Utc::now();
        for (i, body) in ["test-body-1", "test-body-2"].iter().enumerate() {
            let request = sample_request("abc", body, "h", now + Duration::seconds(i as i64));
            queries::insert_request(&state.db, &request).await.unwrap();
        }
        queries::insert_request(&state.db, &sample_request("other", "test-body-3", "h", now))
            .await
            .unwrap();

        let response = send(
            &state,
            Request::get("/api/endpoints/abc/requests").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let requests = json["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["body"], "test-body-2");
        assert_eq!(requests[1]["body"], "test-body-1");

        let response = send(
            &state,
            Request::get("/api/endpoints/abc/requests?search=test-body-1&limit=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["requests"].as_array().unwrap().len(), 1);

        let response = send(
            &state,
            Request::get("/api/endpoints/nobody/requests").body(Body::empty()).unwrap(),
        )
        .await;
        let json = body_json(response).await;
        assert_eq!(json["requests"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped_or_rejected_as_json() {
        let state = test_state(Config::default()).await;
        let now = Utc::now();
        for i in 0..3 {
            let request = sample_request("abc", &format!("body-{}", i), "h", now + Duration::seconds(i));
            queries::insert_request(&state.db, &request).await.unwrap();
        }

        let response = send(
            &state,
            Request::get("/api/endpoints/abc/requests?limit=-1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let requests = json["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["body"], "body-2");

        let response = send(
            &state,
            Request::get("/api/endpoints/abc/requests?limit=abc").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_history_store_failure() {
        let state = test_state(Config::default()).await;
        state.db.close().await;

        let response = send(
            &state,
            Request::get("/api/endpoints/abc/requests").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_debug_counts() {
        let state = test_state(Config::default()).await;
        queries::insert_request(&state.db, &sample_request("abc", "b", "h", Utc::now()))
            .await
            .unwrap();

        let response = send(
            &state,
            Request::get("/api/debug")
                .header("Host", "relay.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["requests"], 1);
        assert_eq!(json["sockets"], 0);
        assert_eq!(json["isProduction"], false);
        assert_eq!(json["host"], "relay.example");
    }
}

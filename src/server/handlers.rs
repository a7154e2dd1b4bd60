//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::state::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        // Detection
        .route("/check", post(check_query))
        // Introspection
        .route("/stats", get(stats))
        .route("/health", get(health_check));

    let router = if state.config.cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Check request
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// The SQL text (or fragment) to classify
    pub query: String,
}

/// Classify one query and record the decision
///
/// The body must be a JSON object with a string `query` field; anything
/// else is rejected with 400 before the detector runs. Log append failures
/// are reported but never turn a resolved decision into an error response.
async fn check_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": rejection.body_text()})),
            );
        },
    };

    let query = req.query.trim();
    let decision = state.detector.resolve(query);

    let reason = decision.reason.to_string();
    if let Err(e) = state.log.append(query, decision.label, Some(&reason)) {
        tracing::warn!("failed to record decision: {e}");
    }

    (StatusCode::OK, Json(serde_json::json!(decision)))
}

/// Aggregate counters over the decision log
async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.log.stats() {
        Ok(snapshot) => (StatusCode::OK, Json(serde_json::json!(snapshot))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok` when the process answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime_secs: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
    })
}

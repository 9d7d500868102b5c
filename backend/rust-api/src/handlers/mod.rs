use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod sessions;
pub mod sse;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let active_sessions = state.service.active_count().await;
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "quizdeck-api",
            "version": env!("CARGO_PKG_VERSION"),
            "active_sessions": active_sessions,
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

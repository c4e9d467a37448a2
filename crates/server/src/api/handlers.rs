//! Health, config, and metrics handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Current configuration with secrets redacted.
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.sanitized_config())
}

/// Prometheus metrics in text exposition format.
pub async fn metrics() -> impl IntoResponse {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::default_registry().gather();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

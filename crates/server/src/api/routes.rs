use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{batches, handlers};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes (authenticated)
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Batches
        .route("/batches", post(batches::create_batch))
        .route("/batches", get(batches::list_batches))
        .route("/batches/{id}", get(batches::get_batch))
        .route("/batches/{id}", delete(batches::delete_batch))
        .route("/batches/{id}/start", post(batches::start_batch))
        .route("/batches/{id}/pause", post(batches::pause_batch))
        .route("/batches/{id}/resume", post(batches::resume_batch))
        .route("/batches/{id}/confirm", post(batches::confirm_gate))
        .route("/batches/{id}/status", get(batches::get_status))
        .route("/batches/{id}/activity", get(batches::get_activity))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            super::middleware::auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        // Metrics stay unauthenticated for scrapers
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(super::middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

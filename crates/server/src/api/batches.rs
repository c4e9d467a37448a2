//! Batch control-surface handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use convoy_core::{BatchFilter, EngineError};

use crate::state::AppState;

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBatchBody {
    /// Human-readable batch name.
    pub name: String,
    /// Item references (e.g. tenant domains) to drive through the pipeline.
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartBody {
    /// Stage index to start at (defaults to 0).
    #[serde(default)]
    pub start_stage: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub batch_id: String,
    pub orchestrator_running: bool,
    pub message: String,
}

/// Map engine errors onto HTTP statuses.
fn engine_error_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::BatchNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::AlreadyRunning(_) | EngineError::InvalidState { .. } => StatusCode::CONFLICT,
        EngineError::InvalidStage { .. } | EngineError::NoStagesConfigured => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a batch over the configured stage plan.
pub async fn create_batch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBatchBody>,
) -> Response {
    match state.manager().create_batch(body.name, body.items) {
        Ok(batch) => (StatusCode::CREATED, Json(batch)).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// List batches, optionally filtered by status.
pub async fn list_batches(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut filter = BatchFilter::new();
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(limit) = query.limit {
        filter = filter.with_limit(limit);
    }
    if let Some(offset) = query.offset {
        filter = filter.with_offset(offset);
    }

    match state.manager().list_batches(&filter) {
        Ok(batches) => Json(batches).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Fetch one batch.
pub async fn get_batch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().get_batch(&id) {
        Ok(Some(batch)) => Json(batch).into_response(),
        Ok(None) => engine_error_response(EngineError::BatchNotFound(id)),
        Err(e) => engine_error_response(e),
    }
}

/// Delete a batch (must not be running).
pub async fn delete_batch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().delete_batch(&id).await {
        Ok(batch) => Json(batch).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Start orchestrating a batch.
pub async fn start_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<StartBody>>,
) -> Response {
    let start_stage = body.map(|Json(b)| b.start_stage).unwrap_or(0);
    match state.manager().start(&id, start_stage).await {
        Ok(()) => Json(MessageResponse {
            message: format!("batch {} started at stage {}", id, start_stage),
        })
        .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Request a cooperative pause.
pub async fn pause_batch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().pause(&id).await {
        Ok(()) => Json(MessageResponse {
            message: format!("pause requested for batch {}", id),
        })
        .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Resume a paused batch from its checkpoint.
pub async fn resume_batch(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().resume(&id).await {
        Ok(stage) => Json(MessageResponse {
            message: format!("batch {} resumed at stage {}", id, stage),
        })
        .into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Confirm the batch's manual gate.
pub async fn confirm_gate(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().confirm_gate(&id).await {
        Ok(confirmation) => {
            let message = if confirmation.orchestrator_running {
                "confirmation delivered to running orchestrator".to_string()
            } else {
                "confirmation recorded; resume the batch to continue".to_string()
            };
            Json(ConfirmResponse {
                batch_id: confirmation.batch_id,
                orchestrator_running: confirmation.orchestrator_running,
                message,
            })
            .into_response()
        }
        Err(e) => engine_error_response(e),
    }
}

/// Live job status, rebuilt from durable state when no cache entry exists.
pub async fn get_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.manager().get_status(&id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => engine_error_response(e),
    }
}

/// Recent stage results for a batch.
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50).min(500);
    match state.manager().get_activity(&id, limit) {
        Ok(results) => Json(results).into_response(),
        Err(e) => engine_error_response(e),
    }
}

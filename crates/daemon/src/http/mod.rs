// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/api/v1` HTTP surface. Envelope shape (`{success, data}` / `{success,
//! error}`) grounded on `training-host-service/endpoints/operations.py`'s
//! `OperationStatusResponse`/`OperationListResponse` contract.

mod checkpoints;
mod operations;
mod workers;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::lifecycle::AppState;

/// Uniform success envelope for every `/api/v1` response body.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self { success: true, data })
    }
}

/// Uniform error envelope, mirroring the source's `{success: false, error}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// Maps the core error taxonomy to HTTP status codes (§7, daemon boundary).
pub struct ApiError(pub ops_core::OpsError);

impl From<ops_core::OpsError> for ApiError {
    fn from(err: ops_core::OpsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use ops_core::OpsError::*;
        let status = match &self.0 {
            NotFound(_) | WorkerNotFound(_) => StatusCode::NOT_FOUND,
            DuplicateId(_) | IllegalTransition(_) => StatusCode::CONFLICT,
            Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Connection { .. } | Timeout { .. } | Service { .. } => StatusCode::BAD_GATEWAY,
            Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { success: false, error: self.0.to_string() })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/operations", post(operations::create).get(operations::list))
        .route("/api/v1/operations/:operation_id", get(operations::get))
        .route("/api/v1/operations/:operation_id/start", post(operations::start))
        .route("/api/v1/operations/:operation_id/progress", post(operations::update_progress))
        .route("/api/v1/operations/:operation_id/complete", post(operations::complete))
        .route("/api/v1/operations/:operation_id/fail", post(operations::fail))
        .route("/api/v1/operations/:operation_id/cancel", delete(operations::cancel))
        .route("/api/v1/operations/:operation_id/retry", post(operations::retry))
        .route("/api/v1/operations/:operation_id/resume", post(operations::resume))
        .route("/api/v1/operations/:operation_id/children", get(operations::children))
        .route("/api/v1/operations/:operation_id/aggregated-progress", get(operations::aggregated_progress))
        .route("/api/v1/operations/:operation_id/metrics", get(operations::metrics))
        .route("/api/v1/workers/register", post(workers::register))
        .route("/api/v1/workers", get(workers::list))
        .route("/api/v1/workers/:worker_id", get(workers::get))
        .route("/api/v1/workers/:worker_id/busy", post(workers::mark_busy))
        .route("/api/v1/workers/:worker_id/idle", post(workers::mark_idle))
        .route(
            "/api/v1/checkpoints/:operation_id",
            post(checkpoints::save).get(checkpoints::load).delete(checkpoints::delete),
        )
        .route("/health", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthBody {
    storage_reachable: bool,
    orphan_detector_running: bool,
}

/// Liveness/readiness: a cheap repository round-trip plus C6's running
/// flag. Returns 200 with `storage_reachable: false` rather than an error
/// status if the probe itself fails — the caller can see the daemon
/// process is alive and inspect why storage looks unreachable.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthBody> {
    let storage_reachable = state.operations.storage_healthy().await;
    let orphan_detector_running = state.orphan_detector.status().running;
    Json(HealthBody { storage_reachable, orphan_detector_running })
}

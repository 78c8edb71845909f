// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker registry routes (C4): registration, liveness, claim state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use ops_core::{CompletedOperationReport, OperationId, OpsError, WorkerId, WorkerInfo};
use serde::Deserialize;

use super::{ApiError, Envelope};
use crate::lifecycle::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub worker_id: String,
    pub worker_type: String,
    pub endpoint_url: String,
    #[serde(default)]
    pub completed_operations: Vec<CompletedOperationReport>,
}

pub async fn register(State(state): State<Arc<AppState>>, Json(request): Json<RegisterRequest>) -> Result<Json<Envelope<bool>>, ApiError> {
    state
        .workers
        .register_worker(WorkerId::new(request.worker_id), request.worker_type, request.endpoint_url, request.completed_operations)
        .await?;
    Ok(Envelope::ok(true))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Envelope<Vec<WorkerInfo>>> {
    Envelope::ok(state.workers.list_workers())
}

pub async fn get(State(state): State<Arc<AppState>>, Path(worker_id): Path<String>) -> Result<Json<Envelope<WorkerInfo>>, ApiError> {
    let id = WorkerId::new(worker_id);
    state.workers.get_worker(&id).map(Envelope::ok).ok_or_else(|| ApiError(OpsError::WorkerNotFound(id.to_string())))
}

#[derive(Debug, Deserialize)]
pub struct MarkBusyRequest {
    pub operation_id: String,
}

pub async fn mark_busy(State(state): State<Arc<AppState>>, Path(worker_id): Path<String>, Json(request): Json<MarkBusyRequest>) -> Result<Json<Envelope<bool>>, ApiError> {
    state.workers.mark_busy(&WorkerId::new(worker_id), OperationId::from_string(request.operation_id))?;
    Ok(Envelope::ok(true))
}

pub async fn mark_idle(State(state): State<Arc<AppState>>, Path(worker_id): Path<String>) -> Result<Json<Envelope<bool>>, ApiError> {
    state.workers.mark_idle(&WorkerId::new(worker_id))?;
    Ok(Envelope::ok(true))
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint routes (C7): the opaque state blobs C8 resumes from.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use ops_core::{CheckpointData, CheckpointType, OperationId, OpsError};
use serde::Deserialize;

use super::{ApiError, Envelope};
use crate::lifecycle::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub checkpoint_type: CheckpointType,
    pub metadata: Option<serde_json::Value>,
}

/// Routed through C3 (`create_checkpoint`), not C7 directly: state is
/// derived from the operation's own tracked progress/metadata, not
/// supplied by the caller. Never fails — a checkpoint that can't be taken
/// (unknown operation, no checkpoint service wired, storage error) comes
/// back as `data: false`, not an error envelope.
pub async fn save(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>, Json(request): Json<SaveRequest>) -> Json<Envelope<bool>> {
    let saved = state
        .operations
        .create_checkpoint(&OperationId::from_string(operation_id), request.checkpoint_type, request.metadata)
        .await;
    Envelope::ok(saved)
}

pub async fn load(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Result<Json<Envelope<CheckpointData>>, ApiError> {
    let id = OperationId::from_string(operation_id);
    match state.checkpoints.load_checkpoint(&id).await? {
        Some(checkpoint) => Ok(Envelope::ok(checkpoint)),
        None => Err(ApiError(OpsError::not_found(id.to_string()))),
    }
}

pub async fn delete(State(state): State<Arc<AppState>>, Path(operation_id): Path<String>) -> Result<Json<Envelope<bool>>, ApiError> {
    state.checkpoints.delete_checkpoint(&OperationId::from_string(operation_id)).await?;
    Ok(Envelope::ok(true))
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint Service (C7): save/load/delete of the opaque domain-state
//! snapshots C8 resumes from (§4.7).

use std::sync::Arc;

use chrono::Utc;
use ops_core::{CheckpointData, CheckpointType, OperationId, OpsResult};
use ops_storage::CheckpointRepository;

pub struct CheckpointService {
    repository: Arc<dyn CheckpointRepository>,
}

impl CheckpointService {
    pub fn new(repository: Arc<dyn CheckpointRepository>) -> Self {
        Self { repository }
    }

    /// Saves a checkpoint, overwriting any previous one for the same
    /// operation. `metadata` defaults to `{checkpoint_type, created_at}`
    /// when not supplied.
    pub async fn save_checkpoint(
        &self,
        operation_id: OperationId,
        checkpoint_type: CheckpointType,
        state: serde_json::Value,
        metadata: Option<serde_json::Value>,
    ) -> OpsResult<()> {
        let checkpoint = CheckpointData::new(operation_id, checkpoint_type, state, metadata, Utc::now());
        self.repository.save(checkpoint).await
    }

    pub async fn load_checkpoint(&self, operation_id: &OperationId) -> OpsResult<Option<CheckpointData>> {
        self.repository.load(operation_id.as_str()).await
    }

    /// Idempotent: deleting a checkpoint that doesn't exist succeeds.
    pub async fn delete_checkpoint(&self, operation_id: &OperationId) -> OpsResult<()> {
        self.repository.delete(operation_id.as_str()).await
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint persistence (C7), §4.7 / §6. At most one live checkpoint per
//! operation; `save_checkpoint` overwrites any previous one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ops_core::{CheckpointData, CheckpointType, OpsError, OpsResult};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CheckpointRow {
    operation_id: String,
    checkpoint_type: String,
    created_at: DateTime<Utc>,
    state: serde_json::Value,
    metadata: serde_json::Value,
}

impl CheckpointRow {
    fn into_data(self) -> CheckpointData {
        CheckpointData {
            operation_id: ops_core::OperationId::from_string(self.operation_id),
            checkpoint_type: parse_checkpoint_type(&self.checkpoint_type),
            created_at: self.created_at,
            state: self.state,
            metadata: self.metadata,
        }
    }
}

fn parse_checkpoint_type(tag: &str) -> CheckpointType {
    match tag {
        "TIMER" => CheckpointType::Timer,
        "FORCE" => CheckpointType::Force,
        "CANCELLATION" => CheckpointType::Cancellation,
        "SHUTDOWN" => CheckpointType::Shutdown,
        _ => CheckpointType::Failure,
    }
}

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    async fn save(&self, checkpoint: CheckpointData) -> OpsResult<()>;
    async fn load(&self, operation_id: &str) -> OpsResult<Option<CheckpointData>>;
    async fn delete(&self, operation_id: &str) -> OpsResult<()>;
}

pub struct PgCheckpointRepository {
    pool: PgPool,
}

impl PgCheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn save(&self, checkpoint: CheckpointData) -> OpsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operation_checkpoints (operation_id, checkpoint_type, created_at, state, metadata)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (operation_id) DO UPDATE SET
                checkpoint_type = EXCLUDED.checkpoint_type,
                created_at = EXCLUDED.created_at,
                state = EXCLUDED.state,
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(checkpoint.operation_id.as_str())
        .bind(checkpoint.checkpoint_type.to_string())
        .bind(checkpoint.created_at)
        .bind(&checkpoint.state)
        .bind(&checkpoint.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| OpsError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, operation_id: &str) -> OpsResult<Option<CheckpointData>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT * FROM operation_checkpoints WHERE operation_id = $1",
        )
        .bind(operation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OpsError::Persistence(e.to_string()))?;
        Ok(row.map(CheckpointRow::into_data))
    }

    async fn delete(&self, operation_id: &str) -> OpsResult<()> {
        sqlx::query("DELETE FROM operation_checkpoints WHERE operation_id = $1")
            .bind(operation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| OpsError::Persistence(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_checkpoint_type_degrades_to_failure() {
        assert_eq!(parse_checkpoint_type("not_a_real_tag"), CheckpointType::Failure);
    }
}

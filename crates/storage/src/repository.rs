// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations repository (durable CRUD), grounded on
//! `ktrdr/api/repositories/operations_repository.py`.

use async_trait::async_trait;
use chrono::Utc;
use ops_core::{OpsError, OpsResult};
use sqlx::PgPool;

use crate::record::OperationRecord;

/// Filters accepted by [`OperationsRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct OperationFilter {
    pub status: Option<String>,
    pub worker_id: Option<String>,
}

/// Fields an update may touch. Unknown/unset fields are left untouched;
/// this mirrors the source's `**fields` kwargs update, minus the dynamic
/// dispatch (every updatable column gets an explicit `Option`).
#[derive(Debug, Clone, Default)]
pub struct OperationUpdate {
    pub status: Option<String>,
    pub worker_id: Option<Option<String>>,
    pub started_at: Option<Option<chrono::DateTime<Utc>>>,
    pub completed_at: Option<Option<chrono::DateTime<Utc>>>,
    pub progress_percent: Option<f64>,
    pub progress_message: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
    pub result: Option<Option<serde_json::Value>>,
    pub error_message: Option<Option<String>>,
    pub last_heartbeat_at: Option<Option<chrono::DateTime<Utc>>>,
    pub reconciliation_status: Option<Option<String>>,
}

const TERMINAL_STATUSES: [&str; 3] = ["completed", "failed", "cancelled"];

/// Durable store for operation rows (§6). Implementations must apply the
/// repository's total-conversion contract: a row that fails to parse into a
/// known `operation_type`/`status` degrades rather than erroring.
#[async_trait]
pub trait OperationsRepository: Send + Sync {
    async fn create(&self, record: OperationRecord) -> OpsResult<OperationRecord>;
    async fn get(&self, operation_id: &str) -> OpsResult<Option<OperationRecord>>;
    async fn update(&self, operation_id: &str, update: OperationUpdate) -> OpsResult<Option<OperationRecord>>;
    async fn list(&self, filter: OperationFilter) -> OpsResult<Vec<OperationRecord>>;
    async fn delete(&self, operation_id: &str) -> OpsResult<bool>;
    /// Retention sweep: deletes terminal operations completed before `cutoff`.
    /// Returns the number of rows removed.
    async fn delete_completed_before(&self, cutoff: chrono::DateTime<Utc>) -> OpsResult<u64>;
}

pub struct PgOperationsRepository {
    pool: PgPool,
}

impl PgOperationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationsRepository for PgOperationsRepository {
    async fn create(&self, record: OperationRecord) -> OpsResult<OperationRecord> {
        let row = sqlx::query_as::<_, OperationRecord>(
            r#"
            INSERT INTO operations (
                operation_id, operation_type, status, parent_operation_id, worker_id, is_backend_local,
                created_at, started_at, completed_at, progress_percent, progress_message,
                metadata, result, error_message, last_heartbeat_at, reconciliation_status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&record.operation_id)
        .bind(&record.operation_type)
        .bind(&record.status)
        .bind(&record.parent_operation_id)
        .bind(&record.worker_id)
        .bind(record.is_backend_local)
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.progress_percent)
        .bind(&record.progress_message)
        .bind(&record.metadata)
        .bind(&record.result)
        .bind(&record.error_message)
        .bind(record.last_heartbeat_at)
        .bind(&record.reconciliation_status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                OpsError::DuplicateId(record.operation_id.clone())
            } else {
                OpsError::Persistence(e.to_string())
            }
        })?;

        tracing::debug!(operation_id = %row.operation_id, "created operation record");
        Ok(row)
    }

    async fn get(&self, operation_id: &str) -> OpsResult<Option<OperationRecord>> {
        sqlx::query_as::<_, OperationRecord>("SELECT * FROM operations WHERE operation_id = $1")
            .bind(operation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| OpsError::Persistence(e.to_string()))
    }

    async fn update(&self, operation_id: &str, mut update: OperationUpdate) -> OpsResult<Option<OperationRecord>> {
        let Some(existing) = self.get(operation_id).await? else {
            return Ok(None);
        };

        // Auto-set completed_at on the first terminal transition (mirrors
        // the source's TERMINAL_STATUSES check in `update()`).
        if let Some(status) = &update.status {
            if TERMINAL_STATUSES.contains(&status.as_str()) && existing.completed_at.is_none() && update.completed_at.is_none() {
                update.completed_at = Some(Some(Utc::now()));
            }
        }

        let row = sqlx::query_as::<_, OperationRecord>(
            r#"
            UPDATE operations SET
                status = COALESCE($2, status),
                worker_id = CASE WHEN $3 THEN $4 ELSE worker_id END,
                started_at = CASE WHEN $5 THEN $6 ELSE started_at END,
                completed_at = CASE WHEN $7 THEN $8 ELSE completed_at END,
                progress_percent = COALESCE($9, progress_percent),
                progress_message = CASE WHEN $10 THEN $11 ELSE progress_message END,
                metadata = COALESCE($12, metadata),
                result = CASE WHEN $13 THEN $14 ELSE result END,
                error_message = CASE WHEN $15 THEN $16 ELSE error_message END,
                last_heartbeat_at = CASE WHEN $17 THEN $18 ELSE last_heartbeat_at END,
                reconciliation_status = CASE WHEN $19 THEN $20 ELSE reconciliation_status END
            WHERE operation_id = $1
            RETURNING *
            "#,
        )
        .bind(operation_id)
        .bind(&update.status)
        .bind(update.worker_id.is_some())
        .bind(update.worker_id.clone().flatten())
        .bind(update.started_at.is_some())
        .bind(update.started_at.flatten())
        .bind(update.completed_at.is_some())
        .bind(update.completed_at.flatten())
        .bind(update.progress_percent)
        .bind(update.progress_message.is_some())
        .bind(update.progress_message.clone().flatten())
        .bind(&update.metadata)
        .bind(update.result.is_some())
        .bind(update.result.clone().flatten())
        .bind(update.error_message.is_some())
        .bind(update.error_message.clone().flatten())
        .bind(update.last_heartbeat_at.is_some())
        .bind(update.last_heartbeat_at.flatten())
        .bind(update.reconciliation_status.is_some())
        .bind(update.reconciliation_status.clone().flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OpsError::Persistence(e.to_string()))?;

        if row.is_some() {
            tracing::debug!(operation_id, "updated operation record");
        }
        Ok(row)
    }

    async fn list(&self, filter: OperationFilter) -> OpsResult<Vec<OperationRecord>> {
        sqlx::query_as::<_, OperationRecord>(
            r#"
            SELECT * FROM operations
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR worker_id = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&filter.status)
        .bind(&filter.worker_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| OpsError::Persistence(e.to_string()))
    }

    async fn delete(&self, operation_id: &str) -> OpsResult<bool> {
        let result = sqlx::query("DELETE FROM operations WHERE operation_id = $1")
            .bind(operation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| OpsError::Persistence(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_completed_before(&self, cutoff: chrono::DateTime<Utc>) -> OpsResult<u64> {
        let result = sqlx::query(
            "DELETE FROM operations WHERE status = ANY($1) AND completed_at < $2",
        )
        .bind(&TERMINAL_STATUSES[..])
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| OpsError::Persistence(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

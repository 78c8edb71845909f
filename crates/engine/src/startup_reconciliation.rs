// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup Reconciliation (C5): on process start, resolves every operation
//! left `running` by a previous (crashed) instance, grounded on
//! `ktrdr/api/services/startup_reconciliation.py`.
//!
//! Backend-local operations cannot have survived the restart (they ran in
//! this process) and are failed immediately. Worker-backed operations may
//! still be running on a remote worker, so they are marked
//! `pending_reconciliation` in storage and left `running`; C6 resolves them
//! once the worker either claims them back or the orphan timeout elapses.

use std::sync::Arc;

use ops_core::OpsResult;
use ops_storage::{OperationFilter, OperationUpdate, OperationsRepository};

/// Summary returned by [`reconcile`], mirroring the source's
/// `ReconciliationResult` dataclass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub total_processed: u64,
    pub worker_ops_reconciled: u64,
    pub backend_ops_failed: u64,
}

const BACKEND_RESTART_ERROR: &str = "Backend restarted - operation was running in backend process";

/// Runs the three-step reconciliation sweep once. Must complete before C6
/// starts (enforced by the caller, not by this function).
pub async fn reconcile(repository: &Arc<dyn OperationsRepository>) -> OpsResult<ReconciliationResult> {
    let running = repository.list(OperationFilter { status: Some("running".to_string()), worker_id: None }).await?;

    let mut result = ReconciliationResult::default();
    for record in &running {
        result.total_processed += 1;
        if record.is_backend_local {
            repository
                .update(
                    &record.operation_id,
                    OperationUpdate { status: Some("failed".to_string()), error_message: Some(Some(BACKEND_RESTART_ERROR.to_string())), ..Default::default() },
                )
                .await?;
            result.backend_ops_failed += 1;
        } else {
            repository
                .update(
                    &record.operation_id,
                    OperationUpdate { reconciliation_status: Some(Some(ops_storage::RECONCILIATION_PENDING.to_string())), ..Default::default() },
                )
                .await?;
            result.worker_ops_reconciled += 1;
        }
    }

    tracing::info!(
        total_processed = result.total_processed,
        worker_ops_reconciled = result.worker_ops_reconciled,
        backend_ops_failed = result.backend_ops_failed,
        "startup reconciliation complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::{OperationId, OperationInfo, OperationMetadata, OperationType};
    use ops_storage::OperationRecord;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A minimal in-memory stand-in for `OperationsRepository`, sufficient
    /// to exercise the reconciliation algorithm without a database.
    #[derive(Default)]
    struct FakeRepository {
        rows: Mutex<HashMap<String, OperationRecord>>,
    }

    #[async_trait::async_trait]
    impl OperationsRepository for FakeRepository {
        async fn create(&self, record: OperationRecord) -> OpsResult<OperationRecord> {
            self.rows.lock().insert(record.operation_id.clone(), record.clone());
            Ok(record)
        }

        async fn get(&self, operation_id: &str) -> OpsResult<Option<OperationRecord>> {
            Ok(self.rows.lock().get(operation_id).cloned())
        }

        async fn update(&self, operation_id: &str, update: OperationUpdate) -> OpsResult<Option<OperationRecord>> {
            let mut rows = self.rows.lock();
            let Some(row) = rows.get_mut(operation_id) else { return Ok(None) };
            if let Some(status) = update.status {
                row.status = status;
            }
            if let Some(error_message) = update.error_message {
                row.error_message = error_message;
            }
            if let Some(reconciliation_status) = update.reconciliation_status {
                row.reconciliation_status = reconciliation_status;
            }
            Ok(Some(row.clone()))
        }

        async fn list(&self, filter: OperationFilter) -> OpsResult<Vec<OperationRecord>> {
            Ok(self
                .rows
                .lock()
                .values()
                .filter(|r| filter.status.as_deref().map(|s| s == r.status).unwrap_or(true))
                .cloned()
                .collect())
        }

        async fn delete(&self, operation_id: &str) -> OpsResult<bool> {
            Ok(self.rows.lock().remove(operation_id).is_some())
        }

        async fn delete_completed_before(&self, _cutoff: chrono::DateTime<chrono::Utc>) -> OpsResult<u64> {
            Ok(0)
        }
    }

    fn seed(repo: &FakeRepository, is_backend_local: bool) -> OperationId {
        let id = OperationId::generate(OperationType::Training, None);
        let info = OperationInfo::new_pending(id.clone(), OperationType::Training, OperationMetadata::default(), None, is_backend_local, chrono::Utc::now());
        let mut record = OperationRecord::from_info(&info);
        record.status = "running".to_string();
        repo.rows.lock().insert(record.operation_id.clone(), record);
        id
    }

    #[tokio::test]
    async fn splits_backend_local_and_worker_operations() {
        let fake = FakeRepository::default();
        let backend_local_id = seed(&fake, true);
        let worker_id = seed(&fake, false);
        let repo: Arc<dyn OperationsRepository> = Arc::new(fake);

        let result = reconcile(&repo).await.unwrap();
        assert_eq!(result, ReconciliationResult { total_processed: 2, worker_ops_reconciled: 1, backend_ops_failed: 1 });

        let backend_row = repo.get(backend_local_id.as_str()).await.unwrap().unwrap();
        assert_eq!(backend_row.status, "failed");
        assert_eq!(backend_row.error_message.as_deref(), Some(BACKEND_RESTART_ERROR));

        let worker_row = repo.get(worker_id.as_str()).await.unwrap().unwrap();
        assert_eq!(worker_row.status, "running");
        assert_eq!(worker_row.reconciliation_status.as_deref(), Some(ops_storage::RECONCILIATION_PENDING));
    }

    #[tokio::test]
    async fn no_running_operations_yields_zeroed_result() {
        let repo: Arc<dyn OperationsRepository> = Arc::new(FakeRepository::default());
        let result = reconcile(&repo).await.unwrap();
        assert_eq!(result, ReconciliationResult::default());
    }
}

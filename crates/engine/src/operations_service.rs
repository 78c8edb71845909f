// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations Service (C3): the cache-backed system of record for
//! operations, grounded on `ktrdr/api/services/operations_service.py`.
//!
//! Reads and writes go through an in-memory cache first; a configured
//! repository is written through synchronously so a crash never leaves the
//! cache ahead of storage. Progress updates (the hottest path) only ever
//! touch the cache — see `update_progress`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ops_core::{
    AggregatedProgress, ChildContribution, CheckpointType, OperationId, OperationInfo, OperationMetadata,
    OperationProgress, OperationStatus, OperationType, OpsError, OpsResult,
};
use ops_storage::{OperationFilter, OperationUpdate, OperationsRepository};
use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::checkpoint_service::CheckpointService;

/// Filter accepted by [`OperationsService::list_operations`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<OperationStatus>,
    pub operation_type: Option<OperationType>,
    pub worker_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub active_only: bool,
}

/// Result of [`OperationsService::list_operations`] (§4.3): the page of
/// items plus counts over the full filtered set, not just the page.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub items: Vec<OperationInfo>,
    pub total_count: usize,
    pub active_count: usize,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub success: bool,
    pub already_terminal: bool,
    pub task_aborted: bool,
}

struct Inner {
    cache: HashMap<OperationId, OperationInfo>,
    /// `parent -> children`, in creation order.
    children: HashMap<OperationId, Vec<OperationId>>,
    tasks: HashMap<OperationId, AbortHandle>,
}

/// The operations system of record (C3). Every other component reaches
/// operation state exclusively through this type.
pub struct OperationsService {
    state: Mutex<Inner>,
    repository: Option<Arc<dyn OperationsRepository>>,
    checkpoints: Mutex<Option<Arc<CheckpointService>>>,
}

impl OperationsService {
    pub fn new(repository: Option<Arc<dyn OperationsRepository>>) -> Self {
        Self {
            state: Mutex::new(Inner { cache: HashMap::new(), children: HashMap::new(), tasks: HashMap::new() }),
            repository,
            checkpoints: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Wires the checkpoint service `create_checkpoint` delegates to (§4.7).
    /// Unlike the worker registry's mandatory operations-service reference,
    /// leaving this unwired is a supported degraded mode: `create_checkpoint`
    /// just returns `false` rather than raising.
    pub fn set_checkpoint_service(&self, checkpoints: Arc<CheckpointService>) {
        *self.checkpoints.lock() = Some(checkpoints);
    }

    /// Creates a new operation in `pending` status.
    ///
    /// Rejects a caller-supplied `parent_operation_id` that doesn't resolve
    /// to a tracked `agent_session` operation (§4.3). A caller-supplied
    /// `operation_id` that already exists surfaces as `DuplicateId`.
    pub async fn create_operation(
        &self,
        operation_type: OperationType,
        metadata: OperationMetadata,
        operation_id: Option<OperationId>,
        parent_operation_id: Option<OperationId>,
    ) -> OpsResult<OperationInfo> {
        let is_backend_local = metadata
            .parameters
            .get("is_backend_local")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if let Some(parent_id) = &parent_operation_id {
            let parent = self.get_operation(parent_id).await?;
            match parent {
                Some(parent) if parent.operation_type == OperationType::AgentSession => {}
                Some(_) => {
                    return Err(OpsError::IllegalTransition(format!(
                        "parent operation {parent_id} is not an agent_session"
                    )))
                }
                None => return Err(OpsError::not_found(parent_id.to_string())),
            }
        }

        let id = operation_id.unwrap_or_else(|| OperationId::generate(operation_type, None));
        let now = Utc::now();
        let info = OperationInfo::new_pending(id.clone(), operation_type, metadata, parent_operation_id.clone(), is_backend_local, now);

        if let Some(repo) = &self.repository {
            repo.create(ops_storage::OperationRecord::from_info(&info)).await?;
        }

        let mut state = self.state.lock();
        if state.cache.contains_key(&id) {
            return Err(OpsError::DuplicateId(id.to_string()));
        }
        state.cache.insert(id.clone(), info.clone());
        if let Some(parent_id) = parent_operation_id {
            state.children.entry(parent_id).or_default().push(id);
        }
        Ok(info)
    }

    /// Transitions an operation to `running`, recording `worker_id` and an
    /// optional abort handle used later by `cancel_operation` to stop the
    /// in-process task, if any.
    pub async fn start_operation(
        &self,
        operation_id: &OperationId,
        worker_id: Option<String>,
        task: Option<AbortHandle>,
    ) -> OpsResult<()> {
        let now = Utc::now();
        let Some(info) = self.mutate(operation_id, |info| {
            info.status = OperationStatus::Running;
            info.started_at = Some(now);
            info.worker_id = worker_id.clone();
        }) else {
            tracing::warn!(%operation_id, "start_operation: unknown operation id");
            return Ok(());
        };

        if let Some(handle) = task {
            self.state.lock().tasks.insert(operation_id.clone(), handle);
        }

        if let Some(repo) = &self.repository {
            repo.update(
                operation_id.as_str(),
                OperationUpdate {
                    status: Some(OperationStatus::Running.as_str().to_string()),
                    worker_id: Some(info.worker_id.clone()),
                    started_at: Some(Some(now)),
                    ..Default::default()
                },
            )
            .await?;
        }
        Ok(())
    }

    /// Applies a monotonic progress update. Unknown ids are logged and
    /// ignored; storage is never touched here by design (§4.3).
    pub fn update_progress(&self, operation_id: &OperationId, update: OperationProgress) {
        let applied = self.mutate(operation_id, |info| info.progress.apply_update(update.clone()));
        if applied.is_none() {
            tracing::warn!(%operation_id, "update_progress: unknown operation id");
        }
    }

    pub async fn complete_operation(&self, operation_id: &OperationId, result_summary: Option<serde_json::Value>) {
        let now = Utc::now();
        let Some(_) = self.mutate(operation_id, |info| {
            info.status = OperationStatus::Completed;
            info.completed_at = Some(now);
            info.progress.percentage = 100.0;
            info.result_summary = result_summary.clone();
        }) else {
            tracing::warn!(%operation_id, "complete_operation: unknown operation id");
            return;
        };
        self.drop_task(operation_id);

        if let Some(repo) = &self.repository {
            if let Err(err) = repo
                .update(
                    operation_id.as_str(),
                    OperationUpdate {
                        status: Some(OperationStatus::Completed.as_str().to_string()),
                        completed_at: Some(Some(now)),
                        progress_percent: Some(100.0),
                        result: Some(result_summary),
                        ..Default::default()
                    },
                )
                .await
            {
                tracing::error!(%operation_id, %err, "complete_operation: storage write failed");
            }
        }
    }

    /// Fails an operation. When `fail_parent` is set and the operation has a
    /// parent, the parent is cascaded to `failed` too (unless already
    /// terminal), mirroring the source's `fail_parent` flag.
    pub async fn fail_operation(&self, operation_id: &OperationId, error_message: impl Into<String>, fail_parent: bool) {
        let error_message = error_message.into();
        let now = Utc::now();
        let Some(info) = self.mutate(operation_id, |info| {
            info.status = OperationStatus::Failed;
            info.completed_at = Some(now);
            info.error_message = Some(error_message.clone());
        }) else {
            tracing::warn!(%operation_id, "fail_operation: unknown operation id");
            return;
        };
        self.drop_task(operation_id);

        if let Some(repo) = &self.repository {
            if let Err(err) = repo
                .update(
                    operation_id.as_str(),
                    OperationUpdate {
                        status: Some(OperationStatus::Failed.as_str().to_string()),
                        completed_at: Some(Some(now)),
                        error_message: Some(Some(error_message.clone())),
                        ..Default::default()
                    },
                )
                .await
            {
                tracing::error!(%operation_id, %err, "fail_operation: storage write failed");
            }
        }

        if fail_parent {
            if let Some(parent_id) = info.parent_operation_id.clone() {
                let parent_terminal = self.get_cached(&parent_id).map(|p| p.is_terminal()).unwrap_or(true);
                if !parent_terminal {
                    Box::pin(self.fail_operation(&parent_id, format!("child operation {operation_id} failed"), true)).await;
                }
            }
        }
    }

    /// Cancels an operation and cascades to its non-terminal children.
    /// Idempotent: cancelling an already-cancelled operation succeeds
    /// without error.
    pub async fn cancel_operation(&self, operation_id: &OperationId, reason: Option<String>) -> OpsResult<CancelOutcome> {
        let Some(current) = self.get_operation(operation_id).await? else {
            return Err(OpsError::not_found(operation_id.to_string()));
        };
        if current.status == OperationStatus::Cancelled {
            return Ok(CancelOutcome { success: true, already_terminal: true, task_aborted: false });
        }
        if current.is_terminal() {
            return Ok(CancelOutcome { success: false, already_terminal: true, task_aborted: false });
        }

        let now = Utc::now();
        self.mutate(operation_id, |info| {
            info.status = OperationStatus::Cancelled;
            info.completed_at = Some(now);
            info.error_message = reason.clone();
        });
        let task_aborted = self.drop_task(operation_id);

        if let Some(repo) = &self.repository {
            repo.update(
                operation_id.as_str(),
                OperationUpdate {
                    status: Some(OperationStatus::Cancelled.as_str().to_string()),
                    completed_at: Some(Some(now)),
                    error_message: Some(reason),
                    ..Default::default()
                },
            )
            .await?;
        }

        let children = self.get_children(operation_id).await;
        for child in children {
            if !child.is_terminal() {
                Box::pin(self.cancel_operation(&child.operation_id, Some(format!("parent operation {operation_id} cancelled")))).await?;
            }
        }

        Ok(CancelOutcome { success: true, already_terminal: false, task_aborted })
    }

    /// Read-through lookup: cache first, falling back to the repository.
    pub async fn get_operation(&self, operation_id: &OperationId) -> OpsResult<Option<OperationInfo>> {
        if let Some(info) = self.get_cached(operation_id) {
            return Ok(Some(info));
        }
        let Some(repo) = &self.repository else { return Ok(None) };
        let Some(record) = repo.get(operation_id.as_str()).await? else { return Ok(None) };
        let info = record.into_info();
        self.state.lock().cache.insert(operation_id.clone(), info.clone());
        Ok(Some(info))
    }

    fn get_cached(&self, operation_id: &OperationId) -> Option<OperationInfo> {
        self.state.lock().cache.get(operation_id).cloned()
    }

    /// Cheap storage reachability probe for `/health` (§6): a bare `list`
    /// round-trip against the repository. Always `true` in cache-only
    /// (no-repository) mode.
    pub async fn storage_healthy(&self) -> bool {
        let Some(repo) = &self.repository else { return true };
        repo.list(OperationFilter::default()).await.is_ok()
    }

    /// Bypasses the cache and reads straight from the repository,
    /// refreshing the cache entry with whatever comes back. Used by
    /// `?force_refresh=true` (§6) when there's no worker to proxy to.
    pub async fn refresh_from_repository(&self, operation_id: &OperationId) -> OpsResult<Option<OperationInfo>> {
        let Some(repo) = &self.repository else { return Ok(self.get_cached(operation_id)) };
        let Some(record) = repo.get(operation_id.as_str()).await? else { return Ok(None) };
        let info = record.into_info();
        self.state.lock().cache.insert(operation_id.clone(), info.clone());
        Ok(Some(info))
    }

    /// Lists tracked operations, returning `(items, total_count, active_count)`
    /// where `active_count` counts non-terminal operations among the full
    /// filtered set (before pagination), newest-created-first (§4.3, §6).
    ///
    /// Reads through the repository, if configured, rather than the cache
    /// alone: right after a restart the cache is empty and an operation that
    /// hasn't been touched since (no `get`/mutation) would otherwise never
    /// appear in a listing. Any cache entry takes priority over its
    /// repository counterpart, since `update_progress` only ever reaches the
    /// cache.
    pub async fn list_operations(&self, filter: ListFilter) -> ListResult {
        let mut items: Vec<OperationInfo> = if let Some(repo) = &self.repository {
            let repo_filter = OperationFilter {
                status: filter.status.map(|s| s.as_str().to_string()),
                worker_id: filter.worker_id.clone(),
            };
            let rows = repo.list(repo_filter).await.unwrap_or_default();
            let mut state = self.state.lock();
            rows.into_iter()
                .map(|record| {
                    let id = OperationId::from_string(record.operation_id.clone());
                    if let Some(cached) = state.cache.get(&id) {
                        cached.clone()
                    } else {
                        let info = record.into_info();
                        state.cache.insert(id, info.clone());
                        info
                    }
                })
                .collect()
        } else {
            self.state.lock().cache.values().cloned().collect()
        };

        if let Some(status) = filter.status {
            items.retain(|op| op.status == status);
        }
        if let Some(operation_type) = filter.operation_type {
            items.retain(|op| op.operation_type == operation_type);
        }
        if let Some(worker_id) = &filter.worker_id {
            items.retain(|op| op.worker_id.as_deref() == Some(worker_id.as_str()));
        }
        if filter.active_only {
            items.retain(|op| !op.is_terminal());
        }
        items.sort_by_key(|op| std::cmp::Reverse(op.created_at));

        let total_count = items.len();
        let active_count = items.iter().filter(|op| !op.is_terminal()).count();

        let offset = filter.offset.unwrap_or(0);
        let page: Vec<OperationInfo> = match filter.limit {
            Some(limit) => items.into_iter().skip(offset).take(limit).collect(),
            None => items.into_iter().skip(offset).collect(),
        };

        ListResult { items: page, total_count, active_count }
    }

    /// Children of `operation_id`, in creation order.
    pub async fn get_children(&self, operation_id: &OperationId) -> Vec<OperationInfo> {
        let state = self.state.lock();
        let Some(ids) = state.children.get(operation_id) else { return Vec::new() };
        ids.iter().filter_map(|id| state.cache.get(id).cloned()).collect()
    }

    /// Aggregates a parent's progress from its children's phase windows
    /// (§4.3). Children without a phase window are excluded from the
    /// aggregation entirely.
    pub async fn get_aggregated_progress(&self, parent_operation_id: &OperationId) -> AggregatedProgress {
        let children = self.get_children(parent_operation_id).await;
        let contributions: Vec<ChildContribution> = children
            .iter()
            .filter_map(|child| {
                let window = child.operation_type.phase_window()?;
                Some(ChildContribution { window, is_terminal: child.is_terminal(), percentage: child.progress.percentage })
            })
            .collect();
        ops_core::aggregate(&contributions)
    }

    /// Creates a fresh `pending` retry of a FAILED operation, copying its
    /// type and metadata. Rejects any other status, terminal or not (§4.3).
    pub async fn retry_operation(&self, operation_id: &OperationId) -> OpsResult<OperationInfo> {
        let Some(original) = self.get_operation(operation_id).await? else {
            return Err(OpsError::not_found(operation_id.to_string()));
        };
        if original.status != OperationStatus::Failed {
            return Err(OpsError::IllegalTransition(format!("operation {operation_id} is not FAILED")));
        }
        let new_id = OperationId::generate(original.operation_type, Some("retry"));
        self.create_operation(original.operation_type, original.metadata.clone(), Some(new_id), original.parent_operation_id.clone())
            .await
    }

    /// Snapshots the operation's current progress and metadata through C7.
    /// Returns `false` rather than raising on any failure: unknown
    /// operation, no checkpoint service wired, or a storage error (§4.3,
    /// §4.7).
    pub async fn create_checkpoint(&self, operation_id: &OperationId, checkpoint_type: CheckpointType, metadata: Option<serde_json::Value>) -> bool {
        let Some(checkpoints) = self.checkpoints.lock().clone() else { return false };
        let Some(info) = self.get_operation(operation_id).await.ok().flatten() else { return false };
        let state = serde_json::json!({"progress": info.progress, "metadata": info.metadata});
        checkpoints.save_checkpoint(operation_id.clone(), checkpoint_type, state, metadata).await.is_ok()
    }

    /// Retention sweep: delegates to the repository, if any. Cache entries
    /// for deleted rows are evicted too.
    pub async fn cleanup_old_operations(&self, max_age_hours: i64) -> OpsResult<u64> {
        let Some(repo) = &self.repository else { return Ok(0) };
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours);
        let removed = repo.delete_completed_before(cutoff).await?;
        let mut state = self.state.lock();
        state.cache.retain(|_, info| !(info.is_terminal() && info.completed_at.map(|t| t < cutoff).unwrap_or(false)));
        Ok(removed)
    }

    fn mutate(&self, operation_id: &OperationId, f: impl FnOnce(&mut OperationInfo)) -> Option<OperationInfo> {
        let mut state = self.state.lock();
        let info = state.cache.get_mut(operation_id)?;
        f(info);
        Some(info.clone())
    }

    fn drop_task(&self, operation_id: &OperationId) -> bool {
        let Some(handle) = self.state.lock().tasks.remove(operation_id) else { return false };
        handle.abort();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::OperationInfoBuilder;

    fn service() -> OperationsService {
        OperationsService::in_memory()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let fetched = svc.get_operation(&created.operation_id).await.unwrap().unwrap();
        assert_eq!(fetched.operation_id, created.operation_id);
        assert_eq!(fetched.status, OperationStatus::Pending);
    }

    #[tokio::test]
    async fn duplicate_caller_supplied_id_is_rejected() {
        let svc = service();
        let id = OperationId::generate(OperationType::Training, None);
        svc.create_operation(OperationType::Training, OperationMetadata::default(), Some(id.clone()), None).await.unwrap();
        let err = svc.create_operation(OperationType::Training, OperationMetadata::default(), Some(id), None).await.unwrap_err();
        assert!(matches!(err, OpsError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn parent_must_be_an_agent_session() {
        let svc = service();
        let not_a_session = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let err = svc
            .create_operation(OperationType::Backtesting, OperationMetadata::default(), None, Some(not_a_session.operation_id))
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn start_then_complete_transitions_status_and_progress() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        svc.start_operation(&created.operation_id, Some("worker-1".to_string()), None).await.unwrap();
        svc.complete_operation(&created.operation_id, Some(serde_json::json!({"ok": true}))).await;
        let info = svc.get_operation(&created.operation_id).await.unwrap().unwrap();
        assert_eq!(info.status, OperationStatus::Completed);
        assert_eq!(info.progress.percentage, 100.0);
        assert!(info.completed_at.is_some());
    }

    #[tokio::test]
    async fn update_progress_on_unknown_id_is_a_silent_no_op() {
        let svc = service();
        let ghost = OperationId::generate(OperationType::Training, None);
        svc.update_progress(&ghost, OperationProgress::at(50.0));
        assert!(svc.get_operation(&ghost).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_with_fail_parent_cascades_to_non_terminal_parent() {
        let svc = service();
        let parent = svc.create_operation(OperationType::AgentSession, OperationMetadata::default(), None, None).await.unwrap();
        let child = svc
            .create_operation(OperationType::Training, OperationMetadata::default(), None, Some(parent.operation_id.clone()))
            .await
            .unwrap();
        svc.fail_operation(&child.operation_id, "boom", true).await;
        let parent_after = svc.get_operation(&parent.operation_id).await.unwrap().unwrap();
        assert_eq!(parent_after.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_already_cancelled() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let first = svc.cancel_operation(&created.operation_id, None).await.unwrap();
        assert!(first.success);
        let second = svc.cancel_operation(&created.operation_id, None).await.unwrap();
        assert!(second.success && second.already_terminal);
    }

    #[tokio::test]
    async fn cancel_cascades_to_non_terminal_children() {
        let svc = service();
        let parent = svc.create_operation(OperationType::AgentSession, OperationMetadata::default(), None, None).await.unwrap();
        let child = svc
            .create_operation(OperationType::Training, OperationMetadata::default(), None, Some(parent.operation_id.clone()))
            .await
            .unwrap();
        svc.cancel_operation(&parent.operation_id, Some("operator requested".to_string())).await.unwrap();
        let child_after = svc.get_operation(&child.operation_id).await.unwrap().unwrap();
        assert_eq!(child_after.status, OperationStatus::Cancelled);
    }

    #[tokio::test]
    async fn aggregated_progress_matches_phase_window_math() {
        let svc = service();
        let parent = svc.create_operation(OperationType::AgentSession, OperationMetadata::default(), None, None).await.unwrap();
        let design = svc
            .create_operation(OperationType::AgentDesign, OperationMetadata::default(), None, Some(parent.operation_id.clone()))
            .await
            .unwrap();
        svc.complete_operation(&design.operation_id, None).await;
        let training = svc
            .create_operation(OperationType::Training, OperationMetadata::default(), None, Some(parent.operation_id.clone()))
            .await
            .unwrap();
        svc.update_progress(&training.operation_id, OperationProgress::at(40.0));

        let aggregated = svc.get_aggregated_progress(&parent.operation_id).await;
        assert!((aggregated.percentage - 35.0).abs() < 1e-9);
        assert_eq!(aggregated.phase_label.as_deref(), Some("Training"));
    }

    #[tokio::test]
    async fn retry_creates_a_fresh_pending_copy() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        svc.fail_operation(&created.operation_id, "transient", false).await;
        let retried = svc.retry_operation(&created.operation_id).await.unwrap();
        assert_eq!(retried.status, OperationStatus::Pending);
        assert_ne!(retried.operation_id, created.operation_id);
    }

    #[tokio::test]
    async fn retry_on_pending_operation_is_rejected() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let err = svc.retry_operation(&created.operation_id).await.unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn retry_on_cancelled_operation_is_rejected() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        svc.cancel_operation(&created.operation_id, None).await.unwrap();
        let err = svc.retry_operation(&created.operation_id).await.unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn list_operations_filters_by_status() {
        let svc = service();
        let a = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let b = svc.create_operation(OperationType::Backtesting, OperationMetadata::default(), None, None).await.unwrap();
        svc.cancel_operation(&b.operation_id, None).await.unwrap();

        let result = svc.list_operations(ListFilter { status: Some(OperationStatus::Pending), ..Default::default() }).await;
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].operation_id, a.operation_id);
        assert_eq!(result.total_count, 1);
        assert_eq!(result.active_count, 1);
    }

    #[tokio::test]
    async fn list_operations_newest_first_with_pagination() {
        let svc = service();
        let a = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let b = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let c = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();

        let all = svc.list_operations(ListFilter::default()).await;
        assert_eq!(all.items.iter().map(|op| op.operation_id.clone()).collect::<Vec<_>>(), vec![c.operation_id.clone(), b.operation_id.clone(), a.operation_id.clone()]);
        assert_eq!(all.total_count, 3);

        let page = svc.list_operations(ListFilter { limit: Some(1), offset: Some(1), ..Default::default() }).await;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].operation_id, b.operation_id);
        assert_eq!(page.total_count, 3);
    }

    #[tokio::test]
    async fn create_checkpoint_without_a_wired_checkpoint_service_returns_false() {
        let svc = service();
        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        assert!(!svc.create_checkpoint(&created.operation_id, ops_core::CheckpointType::Timer, None).await);
    }

    #[tokio::test]
    async fn create_checkpoint_delegates_to_the_wired_checkpoint_service() {
        use crate::checkpoint_service::CheckpointService;
        use ops_storage::CheckpointRepository;
        use std::collections::HashMap as Map;

        #[derive(Default)]
        struct FakeCheckpointRepository {
            rows: Mutex<Map<String, ops_core::CheckpointData>>,
        }

        #[async_trait::async_trait]
        impl CheckpointRepository for FakeCheckpointRepository {
            async fn save(&self, checkpoint: ops_core::CheckpointData) -> OpsResult<()> {
                self.rows.lock().insert(checkpoint.operation_id.to_string(), checkpoint);
                Ok(())
            }
            async fn load(&self, operation_id: &str) -> OpsResult<Option<ops_core::CheckpointData>> {
                Ok(self.rows.lock().get(operation_id).cloned())
            }
            async fn delete(&self, operation_id: &str) -> OpsResult<()> {
                self.rows.lock().remove(operation_id);
                Ok(())
            }
        }

        let svc = service();
        let checkpoints = Arc::new(CheckpointService::new(Arc::new(FakeCheckpointRepository::default())));
        svc.set_checkpoint_service(checkpoints.clone());

        let created = svc.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        assert!(svc.create_checkpoint(&created.operation_id, ops_core::CheckpointType::Force, None).await);
        assert!(checkpoints.load_checkpoint(&created.operation_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_checkpoint_on_unknown_operation_returns_false() {
        use crate::checkpoint_service::CheckpointService;
        use ops_storage::CheckpointRepository;

        #[derive(Default)]
        struct EmptyCheckpointRepository;
        #[async_trait::async_trait]
        impl CheckpointRepository for EmptyCheckpointRepository {
            async fn save(&self, _checkpoint: ops_core::CheckpointData) -> OpsResult<()> {
                Ok(())
            }
            async fn load(&self, _operation_id: &str) -> OpsResult<Option<ops_core::CheckpointData>> {
                Ok(None)
            }
            async fn delete(&self, _operation_id: &str) -> OpsResult<()> {
                Ok(())
            }
        }

        let svc = service();
        svc.set_checkpoint_service(Arc::new(CheckpointService::new(Arc::new(EmptyCheckpointRepository))));
        let ghost = OperationId::generate(OperationType::Training, None);
        assert!(!svc.create_checkpoint(&ghost, ops_core::CheckpointType::Timer, None).await);
    }

    #[tokio::test]
    async fn builder_seeded_cache_entries_are_visible_to_get() {
        let svc = service();
        let seeded = OperationInfoBuilder::default().operation_type(OperationType::DataLoad).build();
        svc.state.lock().cache.insert(seeded.operation_id.clone(), seeded.clone());
        let fetched = svc.get_operation(&seeded.operation_id).await.unwrap().unwrap();
        assert_eq!(fetched.operation_type, OperationType::DataLoad);
    }
}

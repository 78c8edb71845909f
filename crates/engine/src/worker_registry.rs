// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker Registry (C4): tracks live out-of-process workers and reconciles
//! operations they report finished while unreachable (§4.4).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ops_adapters::{HostServiceClient, HostServiceConfig};
use ops_core::{Clock, CompletedOperationReport, OpsError, OpsResult, SystemClock, WorkerId, WorkerInfo};
use parking_lot::Mutex;

use crate::operations_service::OperationsService;

/// Health probe abstraction for C4's background heartbeat loop.
#[async_trait]
pub trait WorkerHealthProbe: Send + Sync {
    async fn probe(&self, endpoint_url: &str) -> bool;
}

/// Probes `{endpoint_url}/health` through C1. Each worker owns a distinct
/// `endpoint_url`, so unlike a fixed-base-url service adapter this builds a
/// short-lived [`HostServiceClient`] scoped to the single probe call rather
/// than keeping one pooled client per worker alive indefinitely.
pub struct HostServiceHealthProbe {
    config_template: HostServiceConfig,
}

impl HostServiceHealthProbe {
    pub fn new(config_template: HostServiceConfig) -> Self {
        Self { config_template }
    }
}

#[async_trait]
impl WorkerHealthProbe for HostServiceHealthProbe {
    async fn probe(&self, endpoint_url: &str) -> bool {
        let config = HostServiceConfig { base_url: endpoint_url.to_string(), ..self.config_template.clone() };
        let client = HostServiceClient::new("worker", "/health", config, false);
        let Ok(scope) = client.acquire() else { return false };
        scope.health(None).await.is_ok()
    }
}

/// The live worker registry (C4). Requires an [`OperationsService`]
/// reference at construction (§4.4, §9): reconciliation on re-registration
/// is not optional behavior, so there is no unwired state to fall into.
pub struct WorkerRegistry<C: Clock = SystemClock> {
    workers: Mutex<HashMap<WorkerId, WorkerInfo>>,
    operations: Arc<OperationsService>,
    clock: C,
}

impl WorkerRegistry<SystemClock> {
    pub fn new(operations: Arc<OperationsService>) -> Self {
        Self { workers: Mutex::new(HashMap::new()), operations, clock: SystemClock }
    }
}

impl<C: Clock> WorkerRegistry<C> {
    pub fn with_clock(operations: Arc<OperationsService>, clock: C) -> Self {
        Self { workers: Mutex::new(HashMap::new()), operations, clock }
    }

    /// Registers (or re-registers) a worker, reconciling any operations it
    /// reports finishing while the control plane was unreachable. Reports
    /// referencing unknown operation ids are skipped with a warning rather
    /// than failing the whole registration.
    pub async fn register_worker(
        &self,
        worker_id: WorkerId,
        worker_type: impl Into<String>,
        endpoint_url: impl Into<String>,
        completed_operations: Vec<CompletedOperationReport>,
    ) -> OpsResult<()> {
        let now_ms = self.clock.epoch_ms();
        self.workers
            .lock()
            .entry(worker_id.clone())
            .and_modify(|w| w.last_heartbeat_at_ms = now_ms)
            .or_insert_with(|| WorkerInfo::new(worker_id, worker_type, endpoint_url, now_ms));

        for report in completed_operations {
            if self.operations.get_operation(&report.operation_id).await?.is_none() {
                tracing::warn!(operation_id = %report.operation_id, "register_worker: reconciliation report for unknown operation");
                continue;
            }
            if report.success {
                self.operations.complete_operation(&report.operation_id, report.result_summary).await;
            } else {
                let message = report.error_message.unwrap_or_else(|| "worker reported failure".to_string());
                self.operations.fail_operation(&report.operation_id, message, false).await;
            }
        }
        Ok(())
    }

    pub fn mark_busy(&self, worker_id: &WorkerId, operation_id: ops_core::OperationId) -> OpsResult<()> {
        let mut workers = self.workers.lock();
        let worker = workers.get_mut(worker_id).ok_or_else(|| OpsError::WorkerNotFound(worker_id.to_string()))?;
        worker.current_operation_id = Some(operation_id);
        Ok(())
    }

    pub fn mark_idle(&self, worker_id: &WorkerId) -> OpsResult<()> {
        let mut workers = self.workers.lock();
        let worker = workers.get_mut(worker_id).ok_or_else(|| OpsError::WorkerNotFound(worker_id.to_string()))?;
        worker.current_operation_id = None;
        Ok(())
    }

    pub fn list_workers(&self) -> Vec<WorkerInfo> {
        self.workers.lock().values().cloned().collect()
    }

    pub fn get_worker(&self, worker_id: &WorkerId) -> Option<WorkerInfo> {
        self.workers.lock().get(worker_id).cloned()
    }

    /// Operation ids currently claimed by a live worker.
    pub fn claimed_operation_ids(&self) -> Vec<ops_core::OperationId> {
        self.workers.lock().values().filter_map(|w| w.current_operation_id.clone()).collect()
    }

    /// Runs one heartbeat pass: probes every worker and evicts any with
    /// `max_unreachable` consecutive failures.
    pub async fn heartbeat_once(&self, probe: &dyn WorkerHealthProbe, max_unreachable: u32) {
        let worker_ids: Vec<WorkerId> = self.workers.lock().keys().cloned().collect();
        for worker_id in worker_ids {
            let Some(endpoint) = self.workers.lock().get(&worker_id).map(|w| w.endpoint_url.clone()) else { continue };
            let healthy = probe.probe(&endpoint).await;
            let now_ms = self.clock.epoch_ms();
            let mut workers = self.workers.lock();
            let Some(worker) = workers.get_mut(&worker_id) else { continue };
            if healthy {
                worker.consecutive_unreachable = 0;
                worker.last_heartbeat_at_ms = now_ms;
            } else {
                worker.consecutive_unreachable += 1;
                if worker.consecutive_unreachable >= max_unreachable {
                    tracing::warn!(%worker_id, "evicting worker after repeated unreachable heartbeats");
                    workers.remove(&worker_id);
                }
            }
        }
    }

    /// Runs `heartbeat_once` on a fixed interval until the returned task is
    /// aborted.
    pub fn spawn_heartbeat_loop(self: Arc<Self>, probe: Arc<dyn WorkerHealthProbe>, interval: Duration, max_unreachable: u32) -> tokio::task::JoinHandle<()>
    where
        C: 'static,
    {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                self.heartbeat_once(probe.as_ref(), max_unreachable).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::{FakeClock, OperationId, OperationMetadata, OperationType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> WorkerRegistry<FakeClock> {
        WorkerRegistry::with_clock(Arc::new(OperationsService::in_memory()), FakeClock::new())
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let reg = registry();
        reg.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![]).await.unwrap();
        let worker = reg.get_worker(&WorkerId::new("w1")).unwrap();
        assert_eq!(worker.endpoint_url, "http://localhost:9001");
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn mark_busy_then_idle() {
        let reg = registry();
        reg.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![]).await.unwrap();
        let op = OperationId::generate(OperationType::Training, None);
        reg.mark_busy(&WorkerId::new("w1"), op).unwrap();
        assert!(reg.get_worker(&WorkerId::new("w1")).unwrap().is_busy());
        reg.mark_idle(&WorkerId::new("w1")).unwrap();
        assert!(!reg.get_worker(&WorkerId::new("w1")).unwrap().is_busy());
    }

    #[tokio::test]
    async fn mark_busy_on_unknown_worker_is_an_error() {
        let reg = registry();
        let op = OperationId::generate(OperationType::Training, None);
        let err = reg.mark_busy(&WorkerId::new("ghost"), op).unwrap_err();
        assert!(matches!(err, OpsError::WorkerNotFound(_)));
    }

    #[tokio::test]
    async fn registration_reconciles_completed_operations_against_ops_service() {
        let ops = Arc::new(OperationsService::in_memory());
        let reg = WorkerRegistry::with_clock(ops.clone(), FakeClock::new());

        let created = ops.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        ops.start_operation(&created.operation_id, Some("w1".to_string()), None).await.unwrap();

        let report = CompletedOperationReport {
            operation_id: created.operation_id.clone(),
            success: true,
            error_message: None,
            result_summary: Some(serde_json::json!({"done": true})),
        };
        reg.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![report]).await.unwrap();

        let info = ops.get_operation(&created.operation_id).await.unwrap().unwrap();
        assert_eq!(info.status, ops_core::OperationStatus::Completed);
    }

    #[tokio::test]
    async fn heartbeat_evicts_after_max_unreachable_failures() {
        let reg = Arc::new(registry());
        reg.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![]).await.unwrap();

        struct AlwaysDown(AtomicUsize);
        #[async_trait]
        impl WorkerHealthProbe for AlwaysDown {
            async fn probe(&self, _endpoint_url: &str) -> bool {
                self.0.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
        let probe = AlwaysDown(AtomicUsize::new(0));

        reg.heartbeat_once(&probe, 2).await;
        assert!(reg.get_worker(&WorkerId::new("w1")).is_some());
        reg.heartbeat_once(&probe, 2).await;
        assert!(reg.get_worker(&WorkerId::new("w1")).is_none());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan Detector (C6): continuously fails `running` operations no worker
//! has claimed within `orphan_timeout`, grounded on
//! `ktrdr/api/services/orphan_detector.py`.
//!
//! Must be started only after C5's reconciliation sweep has completed
//! (enforced by the composition root, not by this type).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ops_core::{Clock, OperationId, OperationStatus, SystemClock};
use parking_lot::Mutex;

use crate::operations_service::{ListFilter, OperationsService};
use crate::worker_registry::WorkerRegistry;

const ORPHAN_MESSAGE: &str = "Operation was RUNNING but no worker claimed it";

/// Ambient introspection snapshot, mirroring the source's `get_status()`.
#[derive(Debug, Clone)]
pub struct OrphanDetectorStatus {
    pub running: bool,
    pub potential_orphans_count: usize,
    pub last_check: Option<DateTime<Utc>>,
    pub orphan_timeout: Duration,
    pub check_interval: Duration,
}

struct State {
    potential_orphans: HashMap<OperationId, Instant>,
    last_check: Option<DateTime<Utc>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

pub struct OrphanDetector<C: Clock = SystemClock> {
    operations: Arc<OperationsService>,
    workers: Arc<WorkerRegistry<C>>,
    orphan_timeout: Duration,
    check_interval: Duration,
    clock: C,
    state: Mutex<State>,
}

impl<C: Clock> OrphanDetector<C> {
    pub fn new(operations: Arc<OperationsService>, workers: Arc<WorkerRegistry<C>>, orphan_timeout: Duration, check_interval: Duration, clock: C) -> Self {
        Self {
            operations,
            workers,
            orphan_timeout,
            check_interval,
            clock,
            state: Mutex::new(State { potential_orphans: HashMap::new(), last_check: None, task: None }),
        }
    }

    /// Idempotent: starting an already-running detector is a no-op.
    pub fn start(self: &Arc<Self>) -> bool
    where
        C: 'static,
    {
        let mut state = self.state.lock();
        if state.task.is_some() {
            return false;
        }
        let this = Arc::clone(self);
        state.task = Some(tokio::spawn(async move { this.detection_loop().await }));
        true
    }

    /// Idempotent: cancels the background task and waits for it to exit.
    pub async fn stop(&self) {
        let handle = self.state.lock().task.take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }

    async fn detection_loop(&self) {
        loop {
            tokio::time::sleep(self.check_interval).await;
            self.check_for_orphans().await;
        }
    }

    /// One detection pass: classify every `running` operation, then sweep
    /// stale tracking entries for operations no longer `running` (§4.6,
    /// steps 2-3 of the source's `_check_for_orphans`).
    pub async fn check_for_orphans(&self) {
        let running = self.operations.list_operations(ListFilter { status: Some(OperationStatus::Running), ..Default::default() }).await.items;
        let claimed: std::collections::HashSet<OperationId> = self.workers.claimed_operation_ids().into_iter().collect();
        let now = self.clock.now();

        let mut to_fail = Vec::new();
        {
            let mut state = self.state.lock();
            for op in &running {
                if claimed.contains(&op.operation_id) {
                    state.potential_orphans.remove(&op.operation_id);
                    continue;
                }
                if op.is_backend_local {
                    continue;
                }
                match state.potential_orphans.get(&op.operation_id) {
                    None => {
                        state.potential_orphans.insert(op.operation_id.clone(), now);
                    }
                    Some(&first_seen) => {
                        let elapsed = now.duration_since(first_seen);
                        if elapsed >= self.orphan_timeout {
                            to_fail.push(op.operation_id.clone());
                        }
                    }
                }
            }

            let running_ids: std::collections::HashSet<&OperationId> = running.iter().map(|op| &op.operation_id).collect();
            state.potential_orphans.retain(|id, _| running_ids.contains(id));
            for id in &to_fail {
                state.potential_orphans.remove(id);
            }
            state.last_check = Some(Utc::now());
        }

        for operation_id in to_fail {
            tracing::warn!(%operation_id, "orphan operation: no worker claimed it, marking failed");
            self.operations.fail_operation(&operation_id, ORPHAN_MESSAGE, false).await;
        }
    }

    pub fn status(&self) -> OrphanDetectorStatus {
        let state = self.state.lock();
        OrphanDetectorStatus {
            running: state.task.is_some(),
            potential_orphans_count: state.potential_orphans.len(),
            last_check: state.last_check,
            orphan_timeout: self.orphan_timeout,
            check_interval: self.check_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::{FakeClock, OperationMetadata, OperationType, WorkerId};

    async fn seed_running(ops: &OperationsService, is_backend_local: bool) -> OperationId {
        let metadata = OperationMetadata::default().with_parameter("is_backend_local", is_backend_local);
        let created = ops.create_operation(OperationType::Training, metadata, None, None).await.unwrap();
        ops.start_operation(&created.operation_id, None, None).await.unwrap();
        created.operation_id
    }

    #[tokio::test]
    async fn zero_timeout_fails_on_second_observation() {
        let ops = Arc::new(OperationsService::in_memory());
        let workers = Arc::new(WorkerRegistry::<FakeClock>::with_clock(ops.clone(), FakeClock::new()));
        let clock = FakeClock::new();
        let detector = OrphanDetector::new(ops.clone(), workers, Duration::from_secs(0), Duration::from_secs(15), clock);

        let op_id = seed_running(&ops, false).await;

        detector.check_for_orphans().await;
        let after_first = ops.get_operation(&op_id).await.unwrap().unwrap();
        assert_eq!(after_first.status, OperationStatus::Running);
        assert_eq!(detector.status().potential_orphans_count, 1);

        detector.check_for_orphans().await;
        let after_second = ops.get_operation(&op_id).await.unwrap().unwrap();
        assert_eq!(after_second.status, OperationStatus::Failed);
        assert_eq!(after_second.error_message.as_deref(), Some(ORPHAN_MESSAGE));
        assert_eq!(detector.status().potential_orphans_count, 0);
    }

    #[tokio::test]
    async fn claimed_operation_is_never_flagged() {
        let ops = Arc::new(OperationsService::in_memory());
        let workers = Arc::new(WorkerRegistry::<FakeClock>::with_clock(ops.clone(), FakeClock::new()));
        workers.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![]).await.unwrap();

        let op_id = seed_running(&ops, false).await;
        workers.mark_busy(&WorkerId::new("w1"), op_id.clone()).unwrap();

        let detector = OrphanDetector::new(ops.clone(), workers, Duration::from_secs(0), Duration::from_secs(15), FakeClock::new());
        detector.check_for_orphans().await;
        detector.check_for_orphans().await;

        let op = ops.get_operation(&op_id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Running);
    }

    #[tokio::test]
    async fn backend_local_operations_are_never_flagged() {
        let ops = Arc::new(OperationsService::in_memory());
        let workers = Arc::new(WorkerRegistry::<FakeClock>::with_clock(ops.clone(), FakeClock::new()));
        let op_id = seed_running(&ops, true).await;

        let detector = OrphanDetector::new(ops.clone(), workers, Duration::from_secs(0), Duration::from_secs(15), FakeClock::new());
        detector.check_for_orphans().await;
        detector.check_for_orphans().await;

        let op = ops.get_operation(&op_id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Running);
    }

    struct AlwaysDown;

    #[async_trait::async_trait]
    impl crate::worker_registry::WorkerHealthProbe for AlwaysDown {
        async fn probe(&self, _endpoint_url: &str) -> bool {
            false
        }
    }

    /// §8 scenario 3: register a worker, claim an operation, evict the worker
    /// via repeated failed health probes, then observe the now-unclaimed
    /// operation age past `orphan_timeout` and fail.
    #[tokio::test]
    async fn evicted_workers_claim_reorphans_the_operation() {
        let ops = Arc::new(OperationsService::in_memory());
        let clock = FakeClock::new();
        let workers = Arc::new(WorkerRegistry::<FakeClock>::with_clock(ops.clone(), clock.clone()));
        workers.register_worker(WorkerId::new("w1"), "training", "http://localhost:9001", vec![]).await.unwrap();

        let op_id = seed_running(&ops, false).await;
        workers.mark_busy(&WorkerId::new("w1"), op_id.clone()).unwrap();

        let detector = OrphanDetector::new(ops.clone(), workers.clone(), Duration::from_secs(1), Duration::from_secs(15), clock.clone());

        detector.check_for_orphans().await;
        assert_eq!(ops.get_operation(&op_id).await.unwrap().unwrap().status, OperationStatus::Running);
        assert_eq!(detector.status().potential_orphans_count, 0);

        workers.heartbeat_once(&AlwaysDown, 1).await;
        assert!(workers.get_worker(&WorkerId::new("w1")).is_none());

        detector.check_for_orphans().await;
        assert_eq!(ops.get_operation(&op_id).await.unwrap().unwrap().status, OperationStatus::Running);
        assert_eq!(detector.status().potential_orphans_count, 1);

        clock.advance(Duration::from_millis(1100));
        detector.check_for_orphans().await;
        let op = ops.get_operation(&op_id).await.unwrap().unwrap();
        assert_eq!(op.status, OperationStatus::Failed);
        assert!(op.error_message.as_deref().unwrap_or_default().contains("no worker claimed it"));
        assert_eq!(detector.status().potential_orphans_count, 0);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_tears_down_the_task() {
        let ops = Arc::new(OperationsService::in_memory());
        let workers = Arc::new(WorkerRegistry::<FakeClock>::with_clock(ops.clone(), FakeClock::new()));
        let detector = Arc::new(OrphanDetector::new(ops, workers, Duration::from_secs(60), Duration::from_millis(5), FakeClock::new()));

        assert!(detector.start());
        assert!(!detector.start());
        assert!(detector.status().running);

        detector.stop().await;
        assert!(!detector.status().running);
    }
}

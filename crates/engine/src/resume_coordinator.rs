// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resume Coordinator (C8): reconstructs a fresh operation from a failed or
//! cancelled one's last checkpoint and hands it to the domain-specific
//! runner registered for its type (§4.8).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ops_core::{CheckpointData, OperationId, OperationInfo, OperationType, OpsError, OpsResult};
use parking_lot::Mutex;
use serde::Serialize;

use crate::checkpoint_service::CheckpointService;
use crate::operations_service::OperationsService;

/// Outcome of a resume request, mirroring the source's response dict.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeOutcome {
    pub success: bool,
    pub original_operation_id: OperationId,
    pub new_operation_id: OperationId,
    pub resumed_from_checkpoint: bool,
}

/// Domain-specific handler invoked once C8 has built the fresh `pending`
/// operation and loaded the original's checkpoint. Registered per
/// `OperationType` at the composition root; core ships only the logging
/// no-op below.
#[async_trait]
pub trait DomainRunner: Send + Sync {
    async fn resume(&self, new_operation: &OperationInfo, checkpoint: &CheckpointData);
}

/// Default runner used for any resumable type with nothing registered.
/// Logs and does nothing — actual domain execution is wired in by whatever
/// owns the process's training/backtesting runtime.
pub struct LoggingNoOpRunner;

#[async_trait]
impl DomainRunner for LoggingNoOpRunner {
    async fn resume(&self, new_operation: &OperationInfo, checkpoint: &CheckpointData) {
        tracing::info!(
            operation_id = %new_operation.operation_id,
            checkpoint_type = %checkpoint.checkpoint_type,
            "resume_coordinator: no domain runner registered, defaulting to no-op"
        );
    }
}

pub struct ResumeCoordinator {
    operations: Arc<OperationsService>,
    checkpoints: Arc<CheckpointService>,
    runners: Mutex<HashMap<OperationType, Arc<dyn DomainRunner>>>,
}

impl ResumeCoordinator {
    pub fn new(operations: Arc<OperationsService>, checkpoints: Arc<CheckpointService>) -> Self {
        Self { operations, checkpoints, runners: Mutex::new(HashMap::new()) }
    }

    pub fn register_runner(&self, operation_type: OperationType, runner: Arc<dyn DomainRunner>) {
        self.runners.lock().insert(operation_type, runner);
    }

    /// The 8-step resume algorithm (§4.8): look up the original, validate
    /// its status and type, load its checkpoint, create a fresh `pending`
    /// operation carrying `parameters.resumed_from`, dispatch to the
    /// type's domain runner, then delete the original's checkpoint.
    pub async fn resume_operation(&self, original_operation_id: &OperationId) -> OpsResult<ResumeOutcome> {
        let original = self
            .operations
            .get_operation(original_operation_id)
            .await?
            .ok_or_else(|| OpsError::not_found(original_operation_id.to_string()))?;

        if !matches!(original.status, ops_core::OperationStatus::Failed | ops_core::OperationStatus::Cancelled) {
            return Err(OpsError::IllegalTransition("only FAILED or CANCELLED operations can be resumed".to_string()));
        }

        let checkpoint = self
            .checkpoints
            .load_checkpoint(original_operation_id)
            .await?
            .ok_or_else(|| OpsError::IllegalTransition(format!("no checkpoint found for operation {original_operation_id}")))?;

        if !original.operation_type.is_resumable() {
            return Err(OpsError::IllegalTransition(format!("resume not supported for operation type {}", original.operation_type)));
        }

        let mut metadata = original.metadata.clone();
        metadata.set_resumed_from(original_operation_id.as_str());
        let new_operation = self
            .operations
            .create_operation(original.operation_type, metadata, None, original.parent_operation_id.clone())
            .await?;

        let runner = self.runners.lock().get(&original.operation_type).cloned();
        match runner {
            Some(runner) => runner.resume(&new_operation, &checkpoint).await,
            None => LoggingNoOpRunner.resume(&new_operation, &checkpoint).await,
        }

        self.checkpoints.delete_checkpoint(original_operation_id).await?;

        Ok(ResumeOutcome {
            success: true,
            original_operation_id: original_operation_id.clone(),
            new_operation_id: new_operation.operation_id,
            resumed_from_checkpoint: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_core::{CheckpointType, OperationMetadata};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn checkpoint_service() -> Arc<CheckpointService> {
        #[derive(Default)]
        struct FakeCheckpointRepository {
            rows: Mutex<HashMap<String, CheckpointData>>,
        }

        #[async_trait]
        impl ops_storage::CheckpointRepository for FakeCheckpointRepository {
            async fn save(&self, checkpoint: CheckpointData) -> OpsResult<()> {
                self.rows.lock().insert(checkpoint.operation_id.to_string(), checkpoint);
                Ok(())
            }
            async fn load(&self, operation_id: &str) -> OpsResult<Option<CheckpointData>> {
                Ok(self.rows.lock().get(operation_id).cloned())
            }
            async fn delete(&self, operation_id: &str) -> OpsResult<()> {
                self.rows.lock().remove(operation_id);
                Ok(())
            }
        }

        Arc::new(CheckpointService::new(Arc::new(FakeCheckpointRepository::default())))
    }

    #[tokio::test]
    async fn resume_creates_a_fresh_pending_operation_with_resumed_from() {
        let ops = Arc::new(OperationsService::in_memory());
        let checkpoints = checkpoint_service();
        let coordinator = ResumeCoordinator::new(ops.clone(), checkpoints.clone());

        let original = ops.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        ops.fail_operation(&original.operation_id, "boom", false).await;
        checkpoints.save_checkpoint(original.operation_id.clone(), CheckpointType::Failure, serde_json::json!({"epoch": 5}), None).await.unwrap();

        let outcome = coordinator.resume_operation(&original.operation_id).await.unwrap();
        assert!(outcome.success);
        assert!(outcome.resumed_from_checkpoint);

        let new_op = ops.get_operation(&outcome.new_operation_id).await.unwrap().unwrap();
        assert_eq!(new_op.status, ops_core::OperationStatus::Pending);
        assert_eq!(new_op.metadata.resumed_from(), Some(original.operation_id.as_str()));

        assert!(checkpoints.load_checkpoint(&original.operation_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resume_rejects_a_still_running_operation() {
        let ops = Arc::new(OperationsService::in_memory());
        let checkpoints = checkpoint_service();
        let coordinator = ResumeCoordinator::new(ops.clone(), checkpoints);

        let original = ops.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        let err = coordinator.resume_operation(&original.operation_id).await.unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn resume_rejects_a_non_resumable_type() {
        let ops = Arc::new(OperationsService::in_memory());
        let checkpoints = checkpoint_service();
        let coordinator = ResumeCoordinator::new(ops.clone(), checkpoints.clone());

        let original = ops.create_operation(OperationType::DataLoad, OperationMetadata::default(), None, None).await.unwrap();
        ops.fail_operation(&original.operation_id, "boom", false).await;
        checkpoints.save_checkpoint(original.operation_id.clone(), CheckpointType::Failure, serde_json::json!({}), None).await.unwrap();

        let err = coordinator.resume_operation(&original.operation_id).await.unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn resume_rejects_when_no_checkpoint_exists() {
        let ops = Arc::new(OperationsService::in_memory());
        let checkpoints = checkpoint_service();
        let coordinator = ResumeCoordinator::new(ops.clone(), checkpoints);

        let original = ops.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        ops.fail_operation(&original.operation_id, "boom", false).await;

        let err = coordinator.resume_operation(&original.operation_id).await.unwrap_err();
        assert!(matches!(err, OpsError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn registered_runner_is_invoked_on_resume() {
        let ops = Arc::new(OperationsService::in_memory());
        let checkpoints = checkpoint_service();
        let coordinator = ResumeCoordinator::new(ops.clone(), checkpoints.clone());

        struct FlagRunner(Arc<AtomicBool>);
        #[async_trait]
        impl DomainRunner for FlagRunner {
            async fn resume(&self, _new_operation: &OperationInfo, _checkpoint: &CheckpointData) {
                self.0.store(true, Ordering::SeqCst);
            }
        }
        let invoked = Arc::new(AtomicBool::new(false));
        coordinator.register_runner(OperationType::Training, Arc::new(FlagRunner(invoked.clone())));

        let original = ops.create_operation(OperationType::Training, OperationMetadata::default(), None, None).await.unwrap();
        ops.fail_operation(&original.operation_id, "boom", false).await;
        checkpoints.save_checkpoint(original.operation_id.clone(), CheckpointType::Failure, serde_json::json!({}), None).await.unwrap();

        coordinator.resume_operation(&original.operation_id).await.unwrap();
        assert!(invoked.load(Ordering::SeqCst));
    }
}

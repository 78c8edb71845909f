// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory/wire operation shape (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{OperationId, OperationMetadata, OperationProgress, OperationStatus, OperationType};

/// Authoritative in-memory representation of a tracked operation.
///
/// This is `OperationInfo` from the spec; the durable `OperationRecord` shape
/// (JSON-blob metadata/result, plus the storage-only `reconciliation_status`
/// and `last_heartbeat_at` columns) lives in `ops-storage` since it is purely
/// a persistence concern (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationInfo {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub parent_operation_id: Option<OperationId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: OperationProgress,
    pub metadata: OperationMetadata,
    pub error_message: Option<String>,
    pub result_summary: Option<serde_json::Value>,
    pub metrics: Option<serde_json::Value>,
    pub is_backend_local: bool,
    pub worker_id: Option<String>,
}

impl OperationInfo {
    pub fn new_pending(
        operation_id: OperationId,
        operation_type: OperationType,
        metadata: OperationMetadata,
        parent_operation_id: Option<OperationId>,
        is_backend_local: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            operation_id,
            operation_type,
            status: OperationStatus::Pending,
            parent_operation_id,
            created_at,
            started_at: None,
            completed_at: None,
            progress: OperationProgress::default(),
            metadata,
            error_message: None,
            result_summary: None,
            metrics: None,
            is_backend_local,
            worker_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Invariant 1: `created_at ≤ started_at ≤ completed_at` when present.
    pub fn timestamps_are_ordered(&self) -> bool {
        if let Some(started_at) = self.started_at {
            if started_at < self.created_at {
                return false;
            }
            if let Some(completed_at) = self.completed_at {
                if completed_at < started_at {
                    return false;
                }
            }
        } else if let Some(completed_at) = self.completed_at {
            if completed_at < self.created_at {
                return false;
            }
        }
        true
    }

    /// Invariant 3: `progress.percentage == 100.0` whenever `status == completed`.
    pub fn completed_implies_full_progress(&self) -> bool {
        self.status != OperationStatus::Completed || self.progress.percentage == 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> OperationInfo {
        OperationInfo::new_pending(
            OperationId::from_string("op_training_20260101_000000_aaaaaaaa"),
            OperationType::Training,
            OperationMetadata::default(),
            None,
            false,
            now,
        )
    }

    #[test]
    fn fresh_operation_has_ordered_timestamps() {
        let op = sample(Utc::now());
        assert!(op.timestamps_are_ordered());
    }

    #[test]
    fn fresh_operation_satisfies_completed_invariant_vacuously() {
        let op = sample(Utc::now());
        assert!(op.completed_implies_full_progress());
    }

    #[test]
    fn out_of_order_timestamps_are_detected() {
        let now = Utc::now();
        let mut op = sample(now);
        op.started_at = Some(now - chrono::Duration::seconds(10));
        assert!(!op.timestamps_are_ordered());
    }
}

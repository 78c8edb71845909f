// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use chrono::Utc;

use crate::{OperationId, OperationInfo, OperationMetadata, OperationStatus, OperationType};

crate::builder! {
    pub struct OperationInfoBuilder => OperationInfo {
        set { operation_type: OperationType = OperationType::Training }
        set { status: OperationStatus = OperationStatus::Pending }
        set { is_backend_local: bool = false }
        option { parent_operation_id: OperationId = None }
        option { worker_id: String = None }
        computed { operation_id: OperationId = OperationId::generate(OperationType::Dummy, None) }
        computed { created_at: chrono::DateTime<Utc> = Utc::now() }
        computed { started_at: Option<chrono::DateTime<Utc>> = None }
        computed { completed_at: Option<chrono::DateTime<Utc>> = None }
        computed { progress: crate::OperationProgress = crate::OperationProgress::default() }
        computed { metadata: OperationMetadata = OperationMetadata::default() }
        computed { error_message: Option<String> = None }
        computed { result_summary: Option<serde_json::Value> = None }
        computed { metrics: Option<serde_json::Value> = None }
    }
}

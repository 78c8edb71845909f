// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint blob types (C7), grounded on `ktrdr/checkpoint/types.py`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trigger/reason for a checkpoint's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckpointType {
    /// Time-based checkpoint, created every N seconds per policy.
    Timer,
    /// Force checkpoint, created every N epochs/bars as a safety net.
    Force,
    /// User cancelled the operation; state saved before cancellation lands.
    Cancellation,
    /// Worker graceful shutdown; state saved before the worker exits.
    Shutdown,
    /// Operation failed; state saved at the failure point.
    Failure,
}

crate::simple_display! {
    CheckpointType {
        Timer => "TIMER",
        Force => "FORCE",
        Cancellation => "CANCELLATION",
        Shutdown => "SHUTDOWN",
        Failure => "FAILURE",
    }
}

/// An opaque snapshot of an operation's internal state, sufficient to
/// resume it (§3, §4.7). The `state` payload is domain-specific and the
/// core never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointData {
    pub operation_id: crate::OperationId,
    pub checkpoint_type: CheckpointType,
    pub created_at: DateTime<Utc>,
    pub state: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl CheckpointData {
    pub fn new(
        operation_id: crate::OperationId,
        checkpoint_type: CheckpointType,
        state: serde_json::Value,
        metadata: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let metadata = metadata.unwrap_or_else(|| {
            serde_json::json!({
                "checkpoint_type": checkpoint_type.to_string(),
                "created_at": created_at.to_rfc3339(),
            })
        });
        Self { operation_id, checkpoint_type, created_at, state, metadata }
    }
}

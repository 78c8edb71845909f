// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an operation.
///
/// `PendingReconciliation` is a legacy alias: it is accepted when
/// deserializing records written by older/foreign writers, but this
/// implementation never produces it as a primary status — see
/// `reconciliation_status` on [`crate::OperationInfo`] for the orthogonal
/// field C5/C6 actually use (SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    PendingReconciliation,
}

crate::simple_display! {
    OperationStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        PendingReconciliation => "pending_reconciliation",
    }
}

impl OperationStatus {
    /// Degrade an unknown storage tag to `Pending` rather than erroring
    /// (the repository's total-conversion contract, §4.2).
    pub fn parse_lenient(tag: &str) -> Self {
        match tag {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "pending_reconciliation" => Self::PendingReconciliation,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::PendingReconciliation => "pending_reconciliation",
        }
    }

    /// Normalizes the legacy `PendingReconciliation` alias to `Running`,
    /// which is the only primary status this implementation ever writes.
    pub fn normalize(self) -> Self {
        match self {
            Self::PendingReconciliation => Self::Running,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set_matches_spec() {
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
        assert!(OperationStatus::Cancelled.is_terminal());
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
        assert!(!OperationStatus::PendingReconciliation.is_terminal());
    }

    #[test]
    fn legacy_alias_normalizes_to_running() {
        assert_eq!(OperationStatus::PendingReconciliation.normalize(), OperationStatus::Running);
        assert_eq!(OperationStatus::Completed.normalize(), OperationStatus::Completed);
    }

    #[test]
    fn unknown_tag_degrades_to_pending() {
        assert_eq!(OperationStatus::parse_lenient("quantum_superposition"), OperationStatus::Pending);
    }
}

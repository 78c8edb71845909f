// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and registry record types (C4).
//!
//! Worker ids are chosen by the worker process itself at registration time
//! (unlike operation ids), so `WorkerId` is a plain string newtype rather
//! than a generated id.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new WorkerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this WorkerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A live worker entry as tracked by the Worker Registry (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: WorkerId,
    pub worker_type: String,
    pub endpoint_url: String,
    pub current_operation_id: Option<crate::OperationId>,
    /// Epoch milliseconds of the last successful health probe or re-registration.
    pub last_heartbeat_at_ms: u64,
    /// Consecutive failed health probes since the last success.
    pub consecutive_unreachable: u32,
}

impl WorkerInfo {
    pub fn new(
        worker_id: WorkerId,
        worker_type: impl Into<String>,
        endpoint_url: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            worker_id,
            worker_type: worker_type.into(),
            endpoint_url: endpoint_url.into(),
            current_operation_id: None,
            last_heartbeat_at_ms: now_ms,
            consecutive_unreachable: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.current_operation_id.is_some()
    }
}

/// A report of an operation a worker finished while the control plane was
/// unreachable, delivered as part of `register_worker`'s `completed_operations`
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOperationReport {
    pub operation_id: crate::OperationId,
    pub success: bool,
    pub error_message: Option<String>,
    pub result_summary: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_round_trips_through_string() {
        let id = WorkerId::new("trainer-1");
        assert_eq!(id.as_str(), "trainer-1");
    }

    #[test]
    fn fresh_worker_is_not_busy() {
        let w = WorkerInfo::new(WorkerId::new("trainer-1"), "training", "http://localhost:8002", 0);
        assert!(!w.is_busy());
    }
}

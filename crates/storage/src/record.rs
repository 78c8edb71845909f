// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable `operations` row shape and its conversion to/from the
//! in-memory [`ops_core::OperationInfo`] (§3, §6).
//!
//! `reconciliation_status` and `last_heartbeat_at` are storage-only: C3 never
//! surfaces them on `OperationInfo`, they exist purely for C5/C6.

use chrono::{DateTime, Utc};
use ops_core::{OperationId, OperationInfo, OperationMetadata, OperationProgress, OperationStatus, OperationType};

/// Value C5 writes into `reconciliation_status` for operations that were
/// running on a remote worker at the moment the control plane restarted
/// (§4.5). The primary `status` column stays `running`.
pub const RECONCILIATION_PENDING: &str = "pending_reconciliation";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationRecord {
    pub operation_id: String,
    pub operation_type: String,
    pub status: String,
    pub parent_operation_id: Option<String>,
    pub worker_id: Option<String>,
    pub is_backend_local: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress_percent: f64,
    pub progress_message: Option<String>,
    pub metadata: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub reconciliation_status: Option<String>,
}

impl OperationRecord {
    /// Converts the in-memory `OperationInfo` to its durable row shape.
    /// `reconciliation_status`/`last_heartbeat_at` are preserved from the
    /// prior row by the repository (they aren't part of `OperationInfo`).
    pub fn from_info(info: &OperationInfo) -> Self {
        Self {
            operation_id: info.operation_id.as_str().to_string(),
            operation_type: info.operation_type.as_str().to_string(),
            status: info.status.as_str().to_string(),
            parent_operation_id: info.parent_operation_id.as_ref().map(|id| id.as_str().to_string()),
            worker_id: info.worker_id.clone(),
            is_backend_local: info.is_backend_local,
            created_at: info.created_at,
            started_at: info.started_at,
            completed_at: info.completed_at,
            progress_percent: info.progress.percentage,
            progress_message: info.progress.current_step.clone(),
            metadata: metadata_to_json(&info.metadata),
            result: info.result_summary.clone(),
            error_message: info.error_message.clone(),
            last_heartbeat_at: None,
            reconciliation_status: None,
        }
    }

    /// Converts the durable row back to `OperationInfo`. Unknown
    /// `operation_type`/`status` tags degrade rather than error, per the
    /// repository's total-conversion contract (§4.2).
    pub fn into_info(self) -> OperationInfo {
        OperationInfo {
            operation_id: OperationId::from_string(self.operation_id),
            operation_type: OperationType::parse_lenient(&self.operation_type),
            status: OperationStatus::parse_lenient(&self.status),
            parent_operation_id: self.parent_operation_id.map(OperationId::from_string),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            progress: OperationProgress {
                percentage: self.progress_percent,
                current_step: self.progress_message,
                steps_completed: None,
                steps_total: None,
                items_processed: None,
                items_total: None,
                current_item: None,
            },
            metadata: json_to_metadata(self.metadata),
            error_message: self.error_message,
            result_summary: self.result,
            metrics: None,
            is_backend_local: self.is_backend_local,
            worker_id: self.worker_id,
        }
    }
}

fn metadata_to_json(metadata: &OperationMetadata) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(symbol) = &metadata.symbol {
        map.insert("symbol".to_string(), symbol.clone().into());
    }
    if let Some(timeframe) = &metadata.timeframe {
        map.insert("timeframe".to_string(), timeframe.clone().into());
    }
    if let Some(mode) = &metadata.mode {
        map.insert("mode".to_string(), mode.clone().into());
    }
    if let Some(start_date) = metadata.start_date {
        map.insert("start_date".to_string(), start_date.to_rfc3339().into());
    }
    if let Some(end_date) = metadata.end_date {
        map.insert("end_date".to_string(), end_date.to_rfc3339().into());
    }
    if !metadata.parameters.is_empty() {
        map.insert("parameters".to_string(), serde_json::to_value(&metadata.parameters).unwrap_or_default());
    }
    serde_json::Value::Object(map)
}

fn json_to_metadata(value: serde_json::Value) -> OperationMetadata {
    let Some(map) = value.as_object() else {
        return OperationMetadata::default();
    };
    OperationMetadata {
        symbol: map.get("symbol").and_then(|v| v.as_str()).map(str::to_string),
        timeframe: map.get("timeframe").and_then(|v| v.as_str()).map(str::to_string),
        mode: map.get("mode").and_then(|v| v.as_str()).map(str::to_string),
        start_date: map.get("start_date").and_then(|v| v.as_str()).and_then(parse_rfc3339),
        end_date: map.get("end_date").and_then(|v| v.as_str()).and_then(parse_rfc3339),
        parameters: map
            .get("parameters")
            .and_then(|v| v.as_object())
            .map(|obj| obj.clone().into_iter().collect())
            .unwrap_or_default(),
    }
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_metadata_through_json() {
        let mut info = OperationInfo::new_pending(
            OperationId::from_string("op_training_20260101_000000_aaaaaaaa"),
            OperationType::Training,
            OperationMetadata::default().with_parameter("resumed_from", "op_earlier"),
            None,
            false,
            Utc::now(),
        );
        info.metadata.symbol = Some("EURUSD".to_string());
        let record = OperationRecord::from_info(&info);
        let round_tripped = record.into_info();
        assert_eq!(round_tripped.metadata.symbol.as_deref(), Some("EURUSD"));
        assert_eq!(round_tripped.metadata.resumed_from(), Some("op_earlier"));
    }

    #[test]
    fn unknown_type_and_status_degrade_gracefully() {
        let record = OperationRecord {
            operation_id: "op_weird_20260101_000000_aaaaaaaa".to_string(),
            operation_type: "not_a_real_type".to_string(),
            status: "also_not_real".to_string(),
            parent_operation_id: None,
            worker_id: None,
            is_backend_local: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress_percent: 0.0,
            progress_message: None,
            metadata: serde_json::json!({}),
            result: None,
            error_message: None,
            last_heartbeat_at: None,
            reconciliation_status: None,
        };
        let info = record.into_info();
        assert_eq!(info.operation_type, OperationType::Dummy);
        assert_eq!(info.status, OperationStatus::Pending);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Free-form operation metadata (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known plus free-form metadata attached to an operation at creation
/// time. `parameters` carries domain- and plumbing-specific flags, notably
/// `resumed_from` (set by C8) — `is_backend_local` is mirrored in here only
/// for wire compatibility; the source of truth is `OperationInfo::is_backend_local`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub mode: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl OperationMetadata {
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn resumed_from(&self) -> Option<&str> {
        self.parameters.get("resumed_from").and_then(|v| v.as_str())
    }

    pub fn set_resumed_from(&mut self, original_id: &str) {
        self.parameters.insert("resumed_from".to_string(), serde_json::Value::String(original_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumed_from_round_trips_through_parameters() {
        let mut meta = OperationMetadata::default();
        meta.set_resumed_from("op_training_20260101_000000_abcd1234");
        assert_eq!(meta.resumed_from(), Some("op_training_20260101_000000_abcd1234"));
    }

    #[test]
    fn with_parameter_builder_inserts_value() {
        let meta = OperationMetadata::default().with_parameter("is_backend_local", true);
        assert_eq!(meta.parameters.get("is_backend_local").and_then(|v| v.as_bool()), Some(true));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operation identifiers.
//!
//! Unlike [`crate::WorkerId`], operation ids are generated by the service
//! itself (`op_[prefix_]<type>_<UTCtimestamp>_<randomsuffix>`, §3) and their
//! length isn't bounded the way [`crate::id::IdBuf`] requires, so this is a
//! `SmolStr`-backed newtype rather than a `define_id!` type.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Borrow;
use std::fmt;

use crate::operation_type::OperationType;

/// Opaque, process-wide-unique identifier for a tracked operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(SmolStr);

impl OperationId {
    /// Generates a new id of the form `op_[prefix_]<type>_<timestamp>_<rand>`.
    ///
    /// `timestamp` is `UTC now` formatted `%Y%m%d_%H%M%S`; `rand` is an
    /// 8-character random suffix, mirroring the source's
    /// `str(uuid.uuid4())[:8]` (read via `original_source/.../operations_service.py`).
    pub fn generate(operation_type: OperationType, prefix: Option<&str>) -> Self {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let suffix = nanoid::nanoid!(8, &nanoid::alphabet::SAFE);
        let raw = match prefix {
            Some(prefix) => format!("op_{prefix}_{}_{timestamp}_{suffix}", operation_type.as_str()),
            None => format!("op_{}_{timestamp}_{suffix}", operation_type.as_str()),
        };
        Self(SmolStr::new(raw))
    }

    pub fn from_string(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(SmolStr::new(s))
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for OperationId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq<str> for OperationId {
    fn eq(&self, other: &str) -> bool {
        self.0.as_str() == other
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the core (§7).

use thiserror::Error;

/// Errors the operations core distinguishes. Mapped to HTTP status codes at
/// the `ops-daemon` boundary (404/409/500); background loops only ever log
/// these, they never propagate out as a crash.
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("operation not found: {0}")]
    NotFound(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("duplicate operation id: {0}")]
    DuplicateId(String),

    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    #[error("connection error reaching {service}: {message}")]
    Connection { service: String, message: String },

    #[error("timeout reaching {service} after {attempts} attempt(s)")]
    Timeout { service: String, attempts: u32 },

    #[error("host service error from {service}: {message}")]
    Service { service: String, message: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl OpsError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type OpsResult<T> = Result<T, OpsError>;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ops-engine: the six components (C3-C8) that sit above `ops-storage` and
//! `ops-adapters` and implement the operations lifecycle itself.

pub mod checkpoint_service;
pub mod operations_service;
pub mod orphan_detector;
pub mod resume_coordinator;
pub mod startup_reconciliation;
pub mod worker_registry;

pub use checkpoint_service::CheckpointService;
pub use operations_service::{CancelOutcome, ListFilter, ListResult, OperationsService};
pub use orphan_detector::{OrphanDetector, OrphanDetectorStatus};
pub use resume_coordinator::{DomainRunner, LoggingNoOpRunner, ResumeCoordinator, ResumeOutcome};
pub use startup_reconciliation::{reconcile, ReconciliationResult};
pub use worker_registry::{HostServiceHealthProbe, WorkerHealthProbe, WorkerRegistry};

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, wiring.

mod startup;
pub use startup::{startup, StartupResult};

use std::sync::Arc;

use ops_engine::{CheckpointService, OperationsService, OrphanDetector, ResumeCoordinator, WorkerRegistry};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Ops(#[from] ops_core::OpsError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to bind {0}: {1}")]
    Bind(std::net::SocketAddr, std::io::Error),
}

/// Shared application state handed to every HTTP handler.
pub struct AppState {
    pub config: Config,
    pub operations: Arc<OperationsService>,
    pub workers: Arc<WorkerRegistry>,
    pub checkpoints: Arc<CheckpointService>,
    pub resume: Arc<ResumeCoordinator>,
    pub orphan_detector: Arc<OrphanDetector>,
}

/// Background task handles started during startup, stopped in reverse order
/// on shutdown.
pub struct BackgroundTasks {
    pub orphan_detector: Arc<OrphanDetector>,
    pub heartbeat: tokio::task::JoinHandle<()>,
    pub cleanup: tokio::task::JoinHandle<()>,
}

impl BackgroundTasks {
    pub async fn shutdown(self) {
        self.heartbeat.abort();
        self.cleanup.abort();
        self.orphan_detector.stop().await;
    }
}

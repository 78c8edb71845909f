// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered startup sequence: connect storage, run reconciliation (C5)
//! strictly before starting the orphan detector (C6), then bind HTTP.

use std::sync::Arc;
use std::time::Duration;

use ops_adapters::HostServiceConfig;
use ops_core::SystemClock;
use ops_engine::{CheckpointService, HostServiceHealthProbe, OperationsService, OrphanDetector, ResumeCoordinator, WorkerRegistry};
use ops_storage::{OperationsRepository, PgCheckpointRepository, PgOperationsRepository};
use tokio::net::TcpListener;
use tracing::info;

use super::{AppState, BackgroundTasks, LifecycleError};
use crate::config::Config;

pub struct StartupResult {
    pub state: Arc<AppState>,
    pub background: BackgroundTasks,
    pub listener: TcpListener,
}

pub async fn startup(config: Config) -> Result<StartupResult, LifecycleError> {
    let pool = ops_storage::connect_and_migrate(&config.database_url).await?;
    info!("connected to storage and applied migrations");

    let operations_repo: Arc<dyn OperationsRepository> = Arc::new(PgOperationsRepository::new(pool.clone()));
    let checkpoint_repo = Arc::new(PgCheckpointRepository::new(pool.clone()));

    let operations = Arc::new(OperationsService::new(Some(operations_repo.clone())));
    let checkpoints = Arc::new(CheckpointService::new(checkpoint_repo));
    operations.set_checkpoint_service(checkpoints.clone());
    let workers = Arc::new(WorkerRegistry::new(operations.clone()));

    let reconciliation = ops_engine::reconcile(&operations_repo).await?;
    info!(
        total_processed = reconciliation.total_processed,
        worker_ops_reconciled = reconciliation.worker_ops_reconciled,
        backend_ops_failed = reconciliation.backend_ops_failed,
        "startup reconciliation complete"
    );

    let resume = Arc::new(ResumeCoordinator::new(operations.clone(), checkpoints.clone()));

    // C6 starts only after C5's reconciliation has fully applied.
    let orphan_detector = Arc::new(OrphanDetector::new(
        operations.clone(),
        workers.clone(),
        config.orphan_timeout,
        config.orphan_check_interval,
        SystemClock,
    ));
    orphan_detector.start();

    let probe = Arc::new(HostServiceHealthProbe::new(HostServiceConfig {
        timeout: Duration::from_secs(5),
        max_connections: config.host_service_max_connections,
        keepalive: config.host_service_keepalive,
        max_connection_age: config.host_service_max_connection_age,
        ..HostServiceConfig::default()
    }));
    let heartbeat = {
        let workers = workers.clone();
        workers.spawn_heartbeat_loop(probe, config.heartbeat_interval, config.max_unreachable)
    };

    let cleanup = {
        let operations = operations.clone();
        let interval = config.cleanup_interval;
        let max_age_hours = config.cleanup_max_age_hours;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                match operations.cleanup_old_operations(max_age_hours).await {
                    Ok(removed) if removed > 0 => info!(removed, "retention sweep removed completed operations"),
                    Ok(_) => {}
                    Err(err) => tracing::error!(%err, "retention sweep failed"),
                }
            }
        })
    };

    let listener = TcpListener::bind(config.http_addr).await.map_err(|e| LifecycleError::Bind(config.http_addr, e))?;
    info!(addr = %config.http_addr, "bound HTTP listener");

    let state = Arc::new(AppState { config, operations, workers, checkpoints, resume, orphan_detector: orphan_detector.clone() });
    Ok(StartupResult { state, background: BackgroundTasks { orphan_detector, heartbeat, cleanup }, listener })
}

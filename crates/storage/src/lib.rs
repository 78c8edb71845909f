// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ops-storage: durable persistence for the operations lifecycle core (§6).

pub mod checkpoints;
pub mod record;
pub mod repository;

pub use checkpoints::{CheckpointRepository, PgCheckpointRepository};
pub use record::{OperationRecord, RECONCILIATION_PENDING};
pub use repository::{OperationFilter, OperationUpdate, OperationsRepository, PgOperationsRepository};

/// Connects to Postgres and runs the embedded migrations. Called once at
/// startup before any repository is constructed (§4, process lifecycle).
pub async fn connect_and_migrate(database_url: &str) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

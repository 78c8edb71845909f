// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `opsctl workers ...` command handlers

use anyhow::Result;
use clap::{Args, Subcommand};
use ops_core::WorkerId;

use crate::client::DaemonClient;
use crate::color;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct WorkersArgs {
    #[command(subcommand)]
    pub command: WorkersCommand,
}

#[derive(Subcommand)]
pub enum WorkersCommand {
    /// Register (or re-register) a worker
    Register {
        worker_id: String,
        worker_type: String,
        endpoint_url: String,
    },
    /// List registered workers
    List {},
    /// Fetch one worker by id
    Get { worker_id: String },
    /// Mark a worker busy, claiming an operation
    Busy { worker_id: String, operation_id: String },
    /// Mark a worker idle
    Idle { worker_id: String },
}

pub async fn handle(command: WorkersCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        WorkersCommand::Register { worker_id, worker_type, endpoint_url } => {
            client.register_worker(worker_id.clone(), worker_type, endpoint_url, Vec::new()).await?;
            println!("worker '{}' registered", color::header(&worker_id));
        }
        WorkersCommand::List {} => {
            let items = client.list_workers().await?;
            match format {
                OutputFormat::Json => print_json(&items)?,
                OutputFormat::Text => {
                    if items.is_empty() {
                        println!("no workers registered");
                    }
                    for worker in &items {
                        let claim = worker.current_operation_id.as_ref().map(|id| id.as_str().to_string()).unwrap_or_else(|| "-".to_string());
                        println!("{}  {}  claim={}", color::header(worker.worker_id.as_str()), worker.worker_type, claim);
                    }
                }
            }
        }
        WorkersCommand::Get { worker_id } => {
            let worker = client.get_worker(&worker_id).await?;
            match format {
                OutputFormat::Json => print_json(&worker)?,
                OutputFormat::Text => println!(
                    "{}  {}  {}  unreachable={}",
                    color::header(worker.worker_id.as_str()),
                    worker.worker_type,
                    worker.endpoint_url,
                    worker.consecutive_unreachable
                ),
            }
        }
        WorkersCommand::Busy { worker_id, operation_id } => {
            client.mark_busy(&WorkerId::new(worker_id.clone()), &operation_id).await?;
            println!("worker '{}' marked busy with '{}'", color::header(&worker_id), operation_id);
        }
        WorkersCommand::Idle { worker_id } => {
            client.mark_idle(&worker_id).await?;
            println!("worker '{}' marked idle", color::header(&worker_id));
        }
    }
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `opsctl operations ...` command handlers

use anyhow::Result;
use clap::{Args, Subcommand};
use ops_core::{OperationMetadata, OperationProgress, OperationStatus, OperationType};

use crate::client::{DaemonClient, ListOperationsFilter};
use crate::color;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct OperationsArgs {
    #[command(subcommand)]
    pub command: OperationsCommand,
}

fn parse_operation_type(raw: &str) -> Result<OperationType, String> {
    match raw {
        "training" => Ok(OperationType::Training),
        "backtesting" => Ok(OperationType::Backtesting),
        "data_load" => Ok(OperationType::DataLoad),
        "agent_session" => Ok(OperationType::AgentSession),
        "agent_design" => Ok(OperationType::AgentDesign),
        "dummy" => Ok(OperationType::Dummy),
        other => Err(format!("unknown operation type '{other}'")),
    }
}

fn parse_operation_status(raw: &str) -> Result<OperationStatus, String> {
    match raw {
        "pending" => Ok(OperationStatus::Pending),
        "running" => Ok(OperationStatus::Running),
        "completed" => Ok(OperationStatus::Completed),
        "failed" => Ok(OperationStatus::Failed),
        "cancelled" => Ok(OperationStatus::Cancelled),
        other => Err(format!("unknown operation status '{other}'")),
    }
}

#[derive(Subcommand)]
pub enum OperationsCommand {
    /// Create a new operation in `pending` status
    Create {
        #[arg(value_parser = parse_operation_type)]
        operation_type: OperationType,
        #[arg(long)]
        operation_id: Option<String>,
        #[arg(long)]
        parent_operation_id: Option<String>,
    },
    /// Fetch one operation by id
    Get {
        operation_id: String,
        /// Bypass the cache and read through to storage (or proxy to the
        /// owning worker), instead of returning a possibly-stale cached row
        #[arg(long)]
        force_refresh: bool,
    },
    /// List tracked operations, optionally filtered
    List {
        #[arg(long, value_parser = parse_operation_status)]
        status: Option<OperationStatus>,
        #[arg(long, value_parser = parse_operation_type)]
        operation_type: Option<OperationType>,
        #[arg(long)]
        worker_id: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        active_only: bool,
    },
    /// Show an operation's recorded metrics, paginated by cursor
    Metrics {
        operation_id: String,
        #[arg(long)]
        cursor: Option<usize>,
    },
    /// Transition an operation to `running`
    Start {
        operation_id: String,
        #[arg(long)]
        worker_id: Option<String>,
    },
    /// Report progress for a running operation
    Progress {
        operation_id: String,
        percentage: f64,
        #[arg(long)]
        current_step: Option<String>,
    },
    /// Mark an operation `completed`
    Complete { operation_id: String },
    /// Mark an operation `failed`
    Fail {
        operation_id: String,
        error_message: String,
        #[arg(long)]
        fail_parent: bool,
    },
    /// Cancel a running or pending operation
    Cancel {
        operation_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Create a fresh `pending` copy of a terminal operation
    Retry { operation_id: String },
    /// Resume a failed/cancelled operation from its last checkpoint
    Resume { operation_id: String },
    /// List an operation's children, in creation order
    Children { operation_id: String },
    /// Show a parent's piecewise-linear aggregated progress
    AggregatedProgress { operation_id: String },
}

pub async fn handle(command: OperationsCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        OperationsCommand::Create { operation_type, operation_id, parent_operation_id } => {
            let info = client.create_operation(operation_type, OperationMetadata::default(), operation_id, parent_operation_id).await?;
            render(format, &info, |i| println!("created {} ({})", color::header(i.operation_id.as_str()), i.status))?;
        }
        OperationsCommand::Get { operation_id, force_refresh } => {
            let info = client.get_operation(&operation_id, force_refresh).await?;
            render(format, &info, |i| println!("{} {} {:.1}%", color::header(i.operation_id.as_str()), i.status, i.progress.percentage))?;
        }
        OperationsCommand::List { status, operation_type, worker_id, limit, offset, active_only } => {
            let result = client.list_operations(ListOperationsFilter { status, operation_type, worker_id, limit, offset, active_only }).await?;
            render(format, &result, |result| {
                if result.items.is_empty() {
                    println!("no operations found");
                }
                for info in &result.items {
                    println!("{}  {}  {:.1}%", color::header(info.operation_id.as_str()), info.status, info.progress.percentage);
                }
                println!("{} of {} total ({} active)", result.items.len(), result.total_count, result.active_count);
            })?;
        }
        OperationsCommand::Metrics { operation_id, cursor } => {
            let metrics = client.get_metrics(&operation_id, cursor).await?;
            render(format, &metrics, |m| {
                for entry in &m.metrics {
                    println!("{entry}");
                }
                println!("cursor={}", m.cursor);
            })?;
        }
        OperationsCommand::Start { operation_id, worker_id } => {
            client.start_operation(&operation_id, worker_id).await?;
            println!("operation '{}' started", color::header(&operation_id));
        }
        OperationsCommand::Progress { operation_id, percentage, current_step } => {
            client.update_progress(&operation_id, OperationProgress { percentage, current_step, ..Default::default() }).await?;
            println!("operation '{}' progress updated", color::header(&operation_id));
        }
        OperationsCommand::Complete { operation_id } => {
            client.complete_operation(&operation_id, None).await?;
            println!("operation '{}' completed", color::header(&operation_id));
        }
        OperationsCommand::Fail { operation_id, error_message, fail_parent } => {
            client.fail_operation(&operation_id, error_message, fail_parent).await?;
            println!("operation '{}' failed", color::header(&operation_id));
        }
        OperationsCommand::Cancel { operation_id, reason } => {
            let (success, already_terminal) = client.cancel_operation(&operation_id, reason).await?;
            if already_terminal {
                println!("operation '{}' was already terminal", color::header(&operation_id));
            } else if success {
                println!("operation '{}' cancelled", color::header(&operation_id));
            }
        }
        OperationsCommand::Retry { operation_id } => {
            let retried = client.retry_operation(&operation_id).await?;
            println!("retried as '{}'", color::header(retried.operation_id.as_str()));
        }
        OperationsCommand::Resume { operation_id } => {
            let outcome = client.resume_operation(&operation_id).await?;
            println!("resumed '{}' as '{}'", color::muted(outcome.original_operation_id.as_str()), color::header(outcome.new_operation_id.as_str()));
        }
        OperationsCommand::Children { operation_id } => {
            let items = client.children(&operation_id).await?;
            render(format, &items, |items| {
                for info in items {
                    println!("{}  {}  {:.1}%", color::header(info.operation_id.as_str()), info.status, info.progress.percentage);
                }
            })?;
        }
        OperationsCommand::AggregatedProgress { operation_id } => {
            let aggregated = client.aggregated_progress(&operation_id).await?;
            render(format, &aggregated, |a| {
                println!("{:.1}%{}", a.percentage, a.phase_label.as_deref().map(|l| format!(" ({l})")).unwrap_or_default());
            })?;
        }
    }
    Ok(())
}

fn render<T: serde::Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(value)?,
        OutputFormat::Text => text(value),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operation_type_accepts_every_known_tag() {
        for tag in ["training", "backtesting", "data_load", "agent_session", "agent_design", "dummy"] {
            assert!(parse_operation_type(tag).is_ok());
        }
    }

    #[test]
    fn parse_operation_type_rejects_unknown_tag() {
        assert!(parse_operation_type("quantum_leap").is_err());
    }

    #[test]
    fn parse_operation_status_rejects_legacy_alias() {
        assert!(parse_operation_status("pending_reconciliation").is_err());
    }
}

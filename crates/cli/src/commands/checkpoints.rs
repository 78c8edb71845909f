// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `opsctl checkpoints ...` command handlers

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::client::DaemonClient;
use crate::color;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct CheckpointsArgs {
    #[command(subcommand)]
    pub command: CheckpointsCommand,
}

fn parse_checkpoint_type(raw: &str) -> Result<ops_core::CheckpointType, String> {
    use ops_core::CheckpointType::*;
    match raw {
        "timer" => Ok(Timer),
        "force" => Ok(Force),
        "cancellation" => Ok(Cancellation),
        "shutdown" => Ok(Shutdown),
        "failure" => Ok(Failure),
        other => Err(format!("unknown checkpoint type '{other}'")),
    }
}

#[derive(Subcommand)]
pub enum CheckpointsCommand {
    /// Save (overwriting) an operation's checkpoint. State is derived from
    /// the operation's own tracked progress, not supplied by the caller.
    Save {
        operation_id: String,
        #[arg(value_parser = parse_checkpoint_type)]
        checkpoint_type: ops_core::CheckpointType,
        /// Optional metadata as a JSON literal, e.g. '{"note": "manual"}'
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Load an operation's checkpoint
    Load { operation_id: String },
    /// Delete an operation's checkpoint (idempotent)
    Delete { operation_id: String },
}

pub async fn handle(command: CheckpointsCommand, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    match command {
        CheckpointsCommand::Save { operation_id, checkpoint_type, metadata } => {
            let metadata = metadata.map(|raw| serde_json::from_str(&raw)).transpose()?;
            client.save_checkpoint(&operation_id, checkpoint_type, metadata).await?;
            println!("checkpoint saved for '{}'", color::header(&operation_id));
        }
        CheckpointsCommand::Load { operation_id } => {
            let checkpoint = client.load_checkpoint(&operation_id).await?;
            match format {
                OutputFormat::Json => print_json(&checkpoint)?,
                OutputFormat::Text => println!("{} {}\n{}", color::header(operation_id.as_str()), checkpoint.checkpoint_type, checkpoint.state),
            }
        }
        CheckpointsCommand::Delete { operation_id } => {
            client.delete_checkpoint(&operation_id).await?;
            println!("checkpoint deleted for '{}'", color::header(&operation_id));
        }
    }
    Ok(())
}

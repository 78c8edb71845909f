// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `opsctl`: thin HTTP client for the operations lifecycle daemon.

mod client;
mod color;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use commands::checkpoints::{self, CheckpointsArgs};
use commands::operations::{self, OperationsArgs};
use commands::workers::{self, WorkersArgs};
use output::OutputFormat;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")");

#[derive(Parser)]
#[command(name = "opsctl", version = VERSION)]
struct Cli {
    /// Base URL of the opsd daemon
    #[arg(long, env = "OPSCTL_DAEMON_URL", default_value = "http://127.0.0.1:8080", global = true)]
    daemon_url: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Operation lifecycle: create, observe, transition
    Operations(OperationsArgs),
    /// Worker registry: registration, claim state
    Workers(WorkersArgs),
    /// Checkpoint save/load/delete
    Checkpoints(CheckpointsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = <Cli as clap::CommandFactory>::command().styles(color::styles()).get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;
    let client = client::DaemonClient::new(cli.daemon_url);

    match cli.command {
        Command::Operations(args) => operations::handle(args.command, &client, cli.format).await,
        Command::Workers(args) => workers::handle(args.command, &client, cli.format).await,
        Command::Checkpoints(args) => checkpoints::handle(args.command, &client, cli.format).await,
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `opsd`: the operations lifecycle and resilience daemon binary.

use ops_daemon::LogFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ops_daemon::Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "ops_daemon=info,tower_http=info".into());
    match config.log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer()).init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(tracing_subscriber::fmt::layer().json()).init();
        }
    }

    tracing::info!(addr = %config.http_addr, "starting opsd");

    let ops_daemon::StartupResult { state, background, listener } = ops_daemon::startup(config).await?;

    let router = ops_daemon::http::router(state);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown signal received"),
            Err(err) => tracing::error!(%err, "failed to install SIGINT handler, shutting down immediately"),
        }
    };

    axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;

    tracing::info!("stopping background tasks");
    background.shutdown().await;

    Ok(())
}

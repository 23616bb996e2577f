//! node-bench entry point

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use bench_runtime::{Cli, HarnessRuntime};
use bench_telemetry::init_telemetry;
use shared_bus::ZmqConnector;
use shared_types::NodeProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Cli::parse()
        .into_config()
        .context("invalid configuration")?;
    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("failed to initialize telemetry")?;

    info!("===========================================");
    info!("  node-bench v{}", env!("CARGO_PKG_VERSION"));
    info!("  backend: {}  node: {}", config.rpc.backend, config.rpc.url());
    info!("===========================================");

    let processor = nb_04_node_client::connect(&config.rpc)
        .await
        .with_context(|| format!("failed to connect to node at {}", config.rpc.url()))?;
    let processor: Arc<dyn NodeProcessor> = Arc::new(processor);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    let report = HarnessRuntime::new(config, processor, cancel)
        .run(ZmqConnector)
        .await?;

    if let Some(summary) = report.broadcast {
        info!(
            submitted = summary.counters.submitted,
            dropped = summary.counters.dropped(),
            retries = summary.counters.retries,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            stop = ?summary.stop,
            "Broadcast summary"
        );
    }
    if let Some(pipeline) = report.pipeline {
        info!(
            blocks = pipeline.listener.accepted,
            ignored = pipeline.listener.ignored,
            failed = pipeline.listener.failed,
            generated = pipeline.miner.map(|m| m.generated).unwrap_or_default(),
            "Listening summary"
        );
    }
    info!(run_id = %report.run_id, "node-bench finished");
    Ok(())
}

//! Pipeline wiring
//!
//! ```text
//!  feed ──▶ EventBus ──hashblock──▶ BlockListener ──Hash256──▶ MinerSimulator
//!                                         │                         │
//!                                         └── get_block_size        └── generate_block
//!                                                   │                         │
//!  Broadcaster ── submit / prepare ──▶  Arc<dyn NodeProcessor>  ◀─────────────┘
//! ```
//!
//! Both pipelines hang off one root [`CancellationToken`]. The run ends when
//! the broadcaster exhausts its budget or the root is cancelled; either way
//! the listening pipeline is then cancelled and joined.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use nb_01_broadcaster::{Broadcaster, RunSummary};
use nb_02_block_listener::{BlockListener, ListenerStats};
use nb_03_miner_simulator::{MinerError, MinerSimulator, MinerStats};
use shared_bus::{topics, BusHandle, Connector, EventBus};
use shared_types::NodeProcessor;

use crate::config::HarnessConfig;

/// Buffered block announcements between the feed and the listener.
pub const BLOCK_CHANNEL_CAPACITY: usize = 1_000;
/// Buffered race resets between the listener and the miner.
pub const BLOCK_FOUND_CAPACITY: usize = 100;

/// Running feed, listener and (optionally) miner tasks.
pub struct ListeningPipeline {
    bus: BusHandle,
    bus_task: JoinHandle<shared_bus::Result<()>>,
    listener_task: JoinHandle<ListenerStats>,
    miner_task: Option<JoinHandle<MinerStats>>,
}

/// Final counters of the listening pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub listener: ListenerStats,
    /// `None` when block generation was disabled.
    pub miner: Option<MinerStats>,
}

impl ListeningPipeline {
    /// Subscription handle of the running bus.
    pub fn bus(&self) -> &BusHandle {
        &self.bus
    }

    /// Wait for every task to exit. Cancel the token first.
    pub async fn join(self) -> Result<PipelineReport> {
        let listener = self.listener_task.await.context("block listener panicked")?;
        let miner = match self.miner_task {
            Some(task) => Some(task.await.context("miner simulator panicked")?),
            None => None,
        };
        if let Err(e) = self.bus_task.await.context("event bus panicked")? {
            warn!(error = %e, "Event bus stopped with error");
        }
        Ok(PipelineReport { listener, miner })
    }
}

/// Connect the event feed and start the listener and miner.
pub async fn spawn_listening<C>(
    config: &HarnessConfig,
    processor: Arc<dyn NodeProcessor>,
    connector: C,
    cancel: &CancellationToken,
) -> Result<ListeningPipeline>
where
    C: Connector + 'static,
    C::Socket: 'static,
{
    let (bus, handle) = EventBus::connect(connector, config.bus.clone())
        .await
        .with_context(|| format!("failed to connect to event feed {}", config.bus.endpoint))?;
    let bus_task = tokio::spawn(bus.run(cancel.child_token()));

    let (block_tx, block_rx) = mpsc::channel(BLOCK_CHANNEL_CAPACITY);
    handle
        .subscribe(topics::HASH_BLOCK, block_tx)
        .await
        .context("failed to subscribe to block announcements")?;

    let (found_tx, found_rx) = mpsc::channel(BLOCK_FOUND_CAPACITY);
    let listener = BlockListener::new(Arc::clone(&processor), config.listener.clone());
    let (listener, miner_task) = match MinerSimulator::new(processor, config.miner, found_rx) {
        Ok(miner) => (
            listener.with_block_found(found_tx),
            Some(tokio::spawn(miner.run(config.start_at, cancel.child_token()))),
        ),
        Err(MinerError::Disabled) => {
            info!("Block generation disabled");
            (listener, None)
        }
    };
    let listener_task = tokio::spawn(listener.run(block_rx, cancel.child_token()));

    info!(endpoint = %config.bus.endpoint, "Listening pipeline started");
    Ok(ListeningPipeline {
        bus: handle,
        bus_task,
        listener_task,
        miner_task,
    })
}

/// Everything a finished run reports.
#[derive(Debug, Clone, Copy)]
pub struct HarnessReport {
    pub run_id: Uuid,
    /// `None` in listen-only mode or when cancelled during preparation.
    pub broadcast: Option<RunSummary>,
    /// `None` when cancelled before the pipeline started.
    pub pipeline: Option<PipelineReport>,
}

/// One measurement run against one node.
pub struct HarnessRuntime {
    config: HarnessConfig,
    processor: Arc<dyn NodeProcessor>,
    cancel: CancellationToken,
    run_id: Uuid,
}

impl HarnessRuntime {
    pub fn new(
        config: HarnessConfig,
        processor: Arc<dyn NodeProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            processor,
            cancel,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Prepare outputs, start listening, then broadcast until the budget or
    /// the root token ends the run.
    ///
    /// The pipeline subscribes only after preparation, so the blocks mined
    /// while preparing are never measured.
    pub async fn run<C>(self, connector: C) -> Result<HarnessReport>
    where
        C: Connector + 'static,
        C::Socket: 'static,
    {
        let mut report = HarnessReport {
            run_id: self.run_id,
            broadcast: None,
            pipeline: None,
        };
        info!(run_id = %self.run_id, listen_only = self.config.listen_only, "Run starting");

        let broadcaster = if self.config.listen_only {
            None
        } else {
            let broadcaster = Broadcaster::new(
                Arc::clone(&self.processor),
                self.config.broadcaster.clone(),
                &self.cancel,
            )?;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Cancelled during UTXO preparation");
                    return Ok(report);
                }
                prepared = broadcaster.prepare_utxos(self.config.utxo_target) => {
                    prepared.context("UTXO preparation failed")?;
                }
            }
            Some(broadcaster)
        };

        let pipeline = spawn_listening(
            &self.config,
            Arc::clone(&self.processor),
            connector,
            &self.cancel,
        )
        .await?;

        match &broadcaster {
            Some(broadcaster) => {
                let run = broadcaster.start(self.config.start_at)?;
                let summary = run.await.context("broadcaster panicked")?;
                broadcaster.shutdown().await;
                report.broadcast = Some(summary);
            }
            None => {
                info!("Listen-only mode, waiting for shutdown signal");
                self.cancel.cancelled().await;
            }
        }

        self.cancel.cancel();
        report.pipeline = Some(pipeline.join().await?);
        info!(run_id = %self.run_id, "Run complete");
        Ok(report)
    }
}

//! Broadcaster service
//!
//! Owns the pool, the submission ticker and the run budget. The run loop is
//! spawned on a [`TaskTracker`] so that [`Broadcaster::shutdown`] can wait
//! for it to exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared_types::{NodeProcessor, ProcessorError, SpendableOutput};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::config::BroadcasterConfig;
use crate::error::{BroadcastError, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::pool::UtxoPool;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The wall-clock budget ran out.
    Deadline,
    /// The transaction ceiling was reached.
    Ceiling,
    /// External cancellation.
    Cancelled,
}

/// Totals reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub counters: MetricsSnapshot,
    pub elapsed: Duration,
    pub stop: StopReason,
    /// Pool depth at exit.
    pub pool_depth: usize,
}

/// Rate-controlled transaction broadcaster
pub struct Broadcaster {
    processor: Arc<dyn NodeProcessor>,
    pool: Arc<UtxoPool>,
    config: BroadcasterConfig,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    started: AtomicBool,
}

impl Broadcaster {
    /// Create a broadcaster whose run stops when `parent` is cancelled.
    pub fn new(
        processor: Arc<dyn NodeProcessor>,
        config: BroadcasterConfig,
        parent: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "[nb-01] Broadcaster configured: rate={}/s fee={} sat pool_capacity={}",
            config.rate_per_second, config.fee_sat, config.pool_capacity
        );

        Ok(Self {
            processor,
            pool: Arc::new(UtxoPool::new(config.pool_capacity)),
            config,
            metrics: Arc::new(Metrics::new()),
            cancel: parent.child_token(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
        })
    }

    /// The output pool.
    pub fn pool(&self) -> &Arc<UtxoPool> {
        &self.pool
    }

    /// Live counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fill the pool with `target` spendable outputs.
    pub async fn prepare_utxos(&self, target: usize) -> Result<()> {
        if target > self.pool.capacity() {
            return Err(BroadcastError::InvalidConfig(format!(
                "target {target} exceeds pool capacity {}",
                self.pool.capacity()
            )));
        }

        info!("[nb-01] Preparing {} UTXOs", target);
        self.processor
            .prepare_utxos(self.pool.as_ref(), target)
            .await
            .map_err(BroadcastError::Prepare)?;
        info!("[nb-01] Pool ready with {} UTXOs", self.pool.len());
        Ok(())
    }

    /// Spawn the submission loop.
    ///
    /// The loop waits until `start_at` (a past or absent time starts now),
    /// then submits once per tick until the budget or cancellation stops it.
    pub fn start(&self, start_at: Option<DateTime<Utc>>) -> Result<JoinHandle<RunSummary>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BroadcastError::AlreadyStarted);
        }

        let run = SubmissionLoop {
            processor: Arc::clone(&self.processor),
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
        };
        Ok(self.tracker.spawn(run.run(start_at)))
    }

    /// Cancel the run and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("[nb-01] Broadcaster shut down");
    }
}

struct SubmissionLoop {
    processor: Arc<dyn NodeProcessor>,
    pool: Arc<UtxoPool>,
    config: BroadcasterConfig,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl SubmissionLoop {
    async fn run(self, start_at: Option<DateTime<Utc>>) -> RunSummary {
        if !self.wait_for_start(start_at).await {
            return self.summary(Duration::ZERO, StopReason::Cancelled);
        }

        let started = Instant::now();
        let deadline = self.config.budget.max_duration.map(|d| started + d);
        let period = self.config.submission_interval();

        let mut ticker = interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stats_period = self.config.stats_interval;
        let mut stats = interval_at(started + stats_period, stats_period);
        stats.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            rate = self.config.rate_per_second,
            interval_us = period.as_micros() as u64,
            budget = ?self.config.budget,
            pool_depth = self.pool.len(),
            "Broadcasting started"
        );

        let stop = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                _ = until(deadline) => {
                    info!("Run deadline reached");
                    self.cancel.cancel();
                    break StopReason::Deadline;
                }
                _ = stats.tick() => {
                    self.log_stats(started, deadline).await;
                    continue;
                }
                _ = ticker.tick() => {}
            }

            // A submission blocked on an empty pool or a retry pause still
            // ends at the deadline.
            tokio::select! {
                biased;
                _ = until(deadline) => {
                    info!("Run deadline reached during submission");
                    self.cancel.cancel();
                    break StopReason::Deadline;
                }
                () = self.submit_next() => {}
            }

            if let Some(ceiling) = self.config.budget.max_transactions {
                if self.metrics.submitted() >= ceiling {
                    info!(ceiling, "Transaction ceiling reached");
                    self.cancel.cancel();
                    break StopReason::Ceiling;
                }
            }
        };

        let summary = self.summary(started.elapsed(), stop);
        info!(
            submitted = summary.counters.submitted,
            dropped_terminal = summary.counters.dropped_terminal,
            dropped_exhausted = summary.counters.dropped_exhausted,
            retries = summary.counters.retries,
            pool_depth = summary.pool_depth,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            stop = ?summary.stop,
            "Broadcasting finished"
        );
        summary
    }

    /// Returns `false` if cancelled while waiting.
    async fn wait_for_start(&self, start_at: Option<DateTime<Utc>>) -> bool {
        let Some(at) = start_at else {
            return true;
        };
        let Ok(wait) = (at - Utc::now()).to_std() else {
            return true;
        };

        info!(start_at = %at.to_rfc3339(), wait_secs = wait.as_secs(), "Waiting for scheduled start");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }

    async fn submit_next(&self) {
        let popped = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            popped = self.pool.pop() => popped,
        };
        let Some(output) = popped else {
            warn!("UTXO pool closed");
            return;
        };

        if !output.can_pay(self.config.fee_sat) {
            let e = ProcessorError::InsufficientValue {
                value: output.value,
                fee: self.config.fee_sat,
            };
            warn!(txid = %output.txid, vout = output.vout, error = %e, "Dropping output");
            self.metrics.record_dropped_terminal();
            return;
        }

        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = self.processor.submit_self_paying_single_output_tx(&output) => result,
            };

            match result {
                Ok(submitted) => {
                    let total = self.metrics.record_submitted();
                    debug!(txid = %submitted.txid, value = submitted.value, total, "Transaction submitted");
                    self.recycle(output.recycled(&submitted)).await;
                    return;
                }
                Err(e) if e.is_cancelled() => return,
                Err(e) if e.is_terminal() => {
                    warn!(txid = %output.txid, vout = output.vout, attempt, error = %e, "Terminal rejection, dropping output");
                    self.metrics.record_dropped_terminal();
                    return;
                }
                Err(e) => {
                    warn!(txid = %output.txid, vout = output.vout, attempt, max_attempts, error = %e, "Submission failed");
                    if attempt < max_attempts {
                        self.metrics.record_retry();
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => return,
                            _ = tokio::time::sleep(self.config.retry_pause) => {}
                        }
                    }
                }
            }
        }

        error!(txid = %output.txid, vout = output.vout, max_attempts, "Attempts exhausted, dropping output");
        self.metrics.record_dropped_exhausted();
    }

    async fn recycle(&self, output: SpendableOutput) {
        let txid = output.txid;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(txid = %txid, "Cancelled before recycling output");
            }
            pushed = self.pool.push(output) => {
                if let Err(e) = pushed {
                    error!(error = %e, "Failed to recycle output");
                }
            }
        }
    }

    async fn log_stats(&self, started: Instant, deadline: Option<Instant>) {
        let counters = self.metrics.snapshot();
        let remaining_secs = deadline.map(|d| d.saturating_duration_since(Instant::now()).as_secs());
        let mempool = match self.processor.get_mempool_size().await {
            Ok(size) => Some(size),
            Err(e) if e.is_unsupported() => None,
            Err(e) => {
                debug!(error = %e, "Mempool size unavailable");
                None
            }
        };

        info!(
            submitted = counters.submitted,
            dropped = counters.dropped(),
            elapsed_secs = started.elapsed().as_secs(),
            remaining_secs = ?remaining_secs,
            pool_depth = self.pool.len(),
            mempool = ?mempool,
            "Broadcaster stats"
        );
    }

    fn summary(&self, elapsed: Duration, stop: StopReason) -> RunSummary {
        RunSummary {
            counters: self.metrics.snapshot(),
            elapsed,
            stop,
            pool_depth: self.pool.len(),
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

//! Miner simulator service

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared_types::{Hash256, NodeProcessor};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::MinerConfig;
use crate::error::{MinerError, Result};
use crate::sampler::{ExponentialSampler, IntervalSampler, MAX_INTERVAL};

/// Counts for one simulator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinerStats {
    /// Blocks produced by this simulator.
    pub generated: u64,
    /// Failed generation attempts.
    pub failed: u64,
    /// Races restarted by a competitor's block.
    pub resets: u64,
}

/// Restartable Poisson block producer.
pub struct MinerSimulator {
    processor: Arc<dyn NodeProcessor>,
    sampler: Box<dyn IntervalSampler>,
    block_found: mpsc::Receiver<Hash256>,
    stats: MinerStats,
}

impl std::fmt::Debug for MinerSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinerSimulator")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl MinerSimulator {
    /// Create a simulator drawing from an entropy-seeded exponential sampler.
    ///
    /// # Errors
    ///
    /// `MinerError::Disabled` when no positive mean interval is configured.
    pub fn new(
        processor: Arc<dyn NodeProcessor>,
        config: MinerConfig,
        block_found: mpsc::Receiver<Hash256>,
    ) -> Result<Self> {
        let mean = config.enabled_interval().ok_or(MinerError::Disabled)?;
        info!(mean_secs = mean.as_secs_f64(), "[nb-03] Miner simulator enabled");
        Ok(Self::with_sampler(
            processor,
            Box::new(ExponentialSampler::from_entropy(mean)),
            block_found,
        ))
    }

    /// Create a simulator with an explicit interval source.
    pub fn with_sampler(
        processor: Arc<dyn NodeProcessor>,
        sampler: Box<dyn IntervalSampler>,
        block_found: mpsc::Receiver<Hash256>,
    ) -> Self {
        Self {
            processor,
            sampler,
            block_found,
            stats: MinerStats::default(),
        }
    }

    /// Race until `cancel` fires.
    ///
    /// Waits for `start_at` first. Every observed block restarts the race
    /// with a fresh draw; every self-found block arms a fresh draw too.
    pub async fn run(
        mut self,
        start_at: Option<DateTime<Utc>>,
        cancel: CancellationToken,
    ) -> MinerStats {
        if let Some(wait) = start_at.and_then(|at| (at - Utc::now()).to_std().ok()) {
            info!(wait_secs = wait.as_secs(), "[nb-03] Miner waiting to start");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.stats,
                _ = sleep(wait) => {}
            }
        }

        let first = self.sampler.next_interval();
        let timer = sleep(first);
        tokio::pin!(timer);
        info!(next_block_ms = first.as_millis() as u64, "[nb-03] Miner race armed");

        let mut observing = true;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                found = self.block_found.recv(), if observing => match found {
                    Some(hash) => {
                        let next = self.sampler.next_interval();
                        timer.as_mut().reset(deadline_after(next));
                        self.stats.resets += 1;
                        info!(hash = %hash, next_block_ms = next.as_millis() as u64, "Competing block observed, race restarted");
                    }
                    None => {
                        info!("Block-found channel closed, racing on own timer only");
                        observing = false;
                    }
                },
                () = &mut timer => {
                    let generated = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        generated = self.processor.generate_block() => generated,
                    };
                    match generated {
                        Ok(block_id) => {
                            self.stats.generated += 1;
                            info!(block = %block_id, "Block generated");
                        }
                        Err(e) => {
                            self.stats.failed += 1;
                            error!(error = %e, "Failed to generate block");
                        }
                    }
                    let next = self.sampler.next_interval();
                    timer.as_mut().reset(deadline_after(next));
                    info!(next_block_ms = next.as_millis() as u64, "New race armed");
                }
            }
        }

        info!(
            generated = self.stats.generated,
            failed = self.stats.failed,
            resets = self.stats.resets,
            "[nb-03] Miner simulator stopped"
        );
        self.stats
    }
}

fn deadline_after(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(interval)
        .unwrap_or_else(|| now + MAX_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared_types::processor::Result as ProcessorResult;
    use shared_types::{BlockSize, OutputSink, ProcessorError, SpendableOutput, SubmittedTx};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::task::JoinHandle;

    /// Hands out a fixed cycle of intervals.
    struct FixedSampler(VecDeque<Duration>);

    impl IntervalSampler for FixedSampler {
        fn next_interval(&mut self) -> Duration {
            let next = self.0.pop_front().unwrap_or(Duration::from_secs(1));
            self.0.push_back(next);
            next
        }
    }

    #[derive(Default)]
    struct MockProcessor {
        fail: bool,
        generated_at: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl NodeProcessor for MockProcessor {
        async fn prepare_utxos(&self, _sink: &dyn OutputSink, _target: usize) -> ProcessorResult<()> {
            Ok(())
        }

        async fn submit_self_paying_single_output_tx(
            &self,
            _output: &SpendableOutput,
        ) -> ProcessorResult<SubmittedTx> {
            Err(ProcessorError::Unsupported("submit"))
        }

        async fn generate_block(&self) -> ProcessorResult<String> {
            self.generated_at.lock().unwrap().push(Instant::now());
            if self.fail {
                return Err(ProcessorError::Connection("node down".to_string()));
            }
            Ok("blockid".to_string())
        }

        async fn get_block_size(&self, _block_hash: &Hash256) -> ProcessorResult<BlockSize> {
            Ok(BlockSize::default())
        }
    }

    fn spawn(
        processor: Arc<MockProcessor>,
        intervals: &[u64],
    ) -> (mpsc::Sender<Hash256>, CancellationToken, JoinHandle<MinerStats>) {
        let (tx, rx) = mpsc::channel(4);
        let sampler = FixedSampler(intervals.iter().map(|s| Duration::from_secs(*s)).collect());
        let miner = MinerSimulator::with_sampler(processor, Box::new(sampler), rx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(miner.run(None, cancel.clone()));
        (tx, cancel, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_competing_block_restarts_race() {
        let processor = Arc::new(MockProcessor::default());
        let start = Instant::now();
        let (tx, cancel, task) = spawn(processor.clone(), &[5]);

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(Hash256::default()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(processor.generated_at.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let fired = processor.generated_at.lock().unwrap().clone();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0] - start, Duration::from_secs(8));

        cancel.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.generated, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_discovery_arms_fresh_race() {
        let processor = Arc::new(MockProcessor::default());
        let (_tx, cancel, task) = spawn(processor.clone(), &[2]);

        tokio::time::sleep(Duration::from_millis(6_500)).await;
        cancel.cancel();

        let stats = task.await.unwrap();
        assert_eq!(stats.generated, 3);
        assert_eq!(stats.resets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_generation_is_logged_and_rearmed() {
        let processor = Arc::new(MockProcessor {
            fail: true,
            ..Default::default()
        });
        let (_tx, cancel, task) = spawn(processor.clone(), &[1]);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        cancel.cancel();

        let stats = task.await.unwrap();
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.generated, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_signal_channel_keeps_racing() {
        let processor = Arc::new(MockProcessor::default());
        let (tx, cancel, task) = spawn(processor.clone(), &[2]);
        drop(tx);

        tokio::time::sleep(Duration::from_millis(4_500)).await;
        cancel.cancel();
        assert_eq!(task.await.unwrap().generated, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_through_run_fires_on_fresh_exponential_draw() {
        let mean = Duration::from_secs(10);
        let seed = (0..)
            .find(|s| ExponentialSampler::seeded(mean, *s).sample() >= Duration::from_secs(1))
            .unwrap();
        let mut reference = ExponentialSampler::seeded(mean, seed);
        let first = reference.sample();
        let redrawn = reference.sample();

        let processor = Arc::new(MockProcessor::default());
        let (tx, rx) = mpsc::channel(4);
        let miner = MinerSimulator::with_sampler(
            processor.clone(),
            Box::new(ExponentialSampler::seeded(mean, seed)),
            rx,
        );
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let task = tokio::spawn(miner.run(None, cancel.clone()));

        let reset_after = first / 2;
        tokio::time::sleep(reset_after).await;
        tx.send(Hash256::default()).await.unwrap();
        tokio::time::sleep(redrawn + Duration::from_millis(10)).await;
        cancel.cancel();
        let stats = task.await.unwrap();

        let fired = processor.generated_at.lock().unwrap().clone();
        assert!(!fired.is_empty());
        let expected = reset_after + redrawn;
        let actual = fired[0] - start;
        let skew = if actual > expected { actual - expected } else { expected - actual };
        assert!(skew <= Duration::from_millis(3), "fired at {actual:?}, expected {expected:?}");
        assert_eq!(stats.resets, 1);
    }

    #[test]
    fn test_disabled_when_interval_unset() {
        let (_tx, rx) = mpsc::channel(1);
        let result = MinerSimulator::new(
            Arc::new(MockProcessor::default()),
            MinerConfig::every(Duration::ZERO),
            rx,
        );
        assert_eq!(result.unwrap_err(), MinerError::Disabled);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (_tx, rx) = mpsc::channel(1);
        let miner = MinerSimulator::new(
            Arc::new(MockProcessor::default()),
            MinerConfig::every(Duration::from_secs(600)),
            rx,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = miner
            .run(Some(Utc::now() + chrono::Duration::hours(1)), cancel)
            .await;
        assert_eq!(stats, MinerStats::default());
    }
}

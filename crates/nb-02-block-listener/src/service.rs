//! Block listener service

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use shared_bus::{topics, BusMessage, Sequence};
use shared_types::{BlockSize, Hash256, NodeProcessor};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::error::{ListenerError, Result};
use crate::MEASUREMENT_TARGET;

/// Measurement of one accepted block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub hash: Hash256,
    pub observed_at: DateTime<Utc>,
    pub size: BlockSize,
    /// Time since the previous accepted block, or since listener start.
    pub delta: Duration,
    pub sequence: Sequence,
}

impl BlockRecord {
    fn emit(&self) {
        info!(
            target: MEASUREMENT_TARGET,
            hash = %self.hash,
            timestamp = %self.observed_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            size = self.size.size_bytes,
            txs = self.size.tx_count,
            delta_ms = self.delta.as_millis() as u64,
            sequence = %self.sequence,
            "Block"
        );
    }
}

/// Event counts for one listener run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub accepted: u64,
    pub ignored: u64,
    pub failed: u64,
    pub unhandled: u64,
    pub last_delta: Option<Duration>,
}

/// Turns block announcements into measurements and miner race resets.
pub struct BlockListener {
    processor: Arc<dyn NodeProcessor>,
    config: ListenerConfig,
    block_found: Option<mpsc::Sender<Hash256>>,
    stats: ListenerStats,
}

impl BlockListener {
    pub fn new(processor: Arc<dyn NodeProcessor>, config: ListenerConfig) -> Self {
        Self {
            processor,
            config,
            block_found: None,
            stats: ListenerStats::default(),
        }
    }

    /// Forward the hash of every accepted block to `tx`.
    ///
    /// Sends wait for capacity, so a stalled receiver stalls the listener.
    pub fn with_block_found(mut self, tx: mpsc::Sender<Hash256>) -> Self {
        self.block_found = Some(tx);
        self
    }

    /// Process `inbound` until cancellation or until the channel closes.
    pub async fn run(
        mut self,
        mut inbound: mpsc::Receiver<BusMessage>,
        cancel: CancellationToken,
    ) -> ListenerStats {
        let started = Instant::now();
        let mut previous = started;
        info!(
            warmup_secs = self.config.warmup.as_secs(),
            ignored = self.config.ignored_hashes.len(),
            "[nb-02] Block listener started"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => {
                        info!("[nb-02] Inbound channel closed");
                        break;
                    }
                },
            };

            if message.topic != topics::HASH_BLOCK {
                warn!(topic = %message.topic, payload = %message.payload_hex, "Unhandled bus message");
                self.stats.unhandled += 1;
                continue;
            }

            if started.elapsed() < self.config.warmup {
                debug!(hash = %message.payload_hex, "Ignoring block during warm-up");
                self.stats.ignored += 1;
                continue;
            }
            if self.config.is_ignored(&message.payload_hex) {
                debug!(hash = %message.payload_hex, "Ignoring listed block");
                self.stats.ignored += 1;
                continue;
            }

            let measured = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                measured = self.measure(&message) => measured,
            };
            let (hash, size) = match measured {
                Ok(measured) => measured,
                Err(e) => {
                    error!(error = %e, "Dropping block event");
                    self.stats.failed += 1;
                    continue;
                }
            };

            let now = Instant::now();
            let record = BlockRecord {
                hash,
                observed_at: Utc::now(),
                size,
                delta: now.duration_since(previous),
                sequence: message.sequence,
            };
            previous = now;
            record.emit();
            self.stats.accepted += 1;
            self.stats.last_delta = Some(record.delta);

            if !self.signal(record.hash, &cancel).await {
                break;
            }
        }

        info!(
            accepted = self.stats.accepted,
            ignored = self.stats.ignored,
            failed = self.stats.failed,
            "[nb-02] Block listener stopped"
        );
        self.stats
    }

    async fn measure(&self, message: &BusMessage) -> Result<(Hash256, BlockSize)> {
        let hash: Hash256 =
            message
                .payload_hex
                .parse()
                .map_err(|source| ListenerError::InvalidHash {
                    payload: message.payload_hex.clone(),
                    source,
                })?;

        let size = self
            .processor
            .get_block_size(&hash)
            .await
            .map_err(|source| ListenerError::BlockQuery {
                hash: hash.to_string(),
                source,
            })?;
        Ok((hash, size))
    }

    /// Returns `false` if cancelled while waiting for the receiver.
    async fn signal(&self, hash: Hash256, cancel: &CancellationToken) -> bool {
        let Some(tx) = &self.block_found else {
            return true;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = tx.send(hash) => {
                if sent.is_err() {
                    debug!(hash = %hash, "Block-found receiver gone");
                }
                true
            }
        }
    }
}

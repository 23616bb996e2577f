//! # UTXO Pool
//!
//! Bounded multi-producer multi-consumer queue of [`SpendableOutput`]s.
//! Pushing into a full pool waits; popping from an empty pool waits.

use async_trait::async_trait;
use shared_types::{OutputSink, ProcessorError, SpendableOutput};
use tokio::sync::{mpsc, Mutex};

/// Bounded pool of outputs the harness can spend.
pub struct UtxoPool {
    tx: mpsc::Sender<SpendableOutput>,
    rx: Mutex<mpsc::Receiver<SpendableOutput>>,
    capacity: usize,
}

impl UtxoPool {
    /// Create an empty pool holding at most `capacity` outputs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Insert an output, waiting while the pool is full.
    pub async fn push(&self, output: SpendableOutput) -> Result<(), ProcessorError> {
        self.tx
            .send(output)
            .await
            .map_err(|_| ProcessorError::PoolClosed)
    }

    /// Insert without waiting. Returns the output back when the pool is full.
    pub fn try_push(&self, output: SpendableOutput) -> Result<(), SpendableOutput> {
        self.tx.try_send(output).map_err(|e| e.into_inner())
    }

    /// Remove the oldest output, waiting while the pool is empty.
    ///
    /// Cancel safe.
    pub async fn pop(&self) -> Option<SpendableOutput> {
        self.rx.lock().await.recv().await
    }

    /// Remove the oldest output without waiting.
    pub fn try_pop(&self) -> Option<SpendableOutput> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Outputs currently held.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl OutputSink for UtxoPool {
    async fn push(&self, output: SpendableOutput) -> Result<(), ProcessorError> {
        UtxoPool::push(self, output).await
    }

    fn len(&self) -> usize {
        UtxoPool::len(self)
    }
}

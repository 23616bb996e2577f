//! Run counters for the broadcaster

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the run loop and observers
#[derive(Debug, Default)]
pub struct Metrics {
    /// Accepted self-paying transactions
    pub submitted: AtomicU64,

    /// Outputs dropped on a terminal rejection or insufficient value
    pub dropped_terminal: AtomicU64,

    /// Outputs dropped after exhausting their attempts
    pub dropped_exhausted: AtomicU64,

    /// Retried attempts
    pub retries: AtomicU64,
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub dropped_terminal: u64,
    pub dropped_exhausted: u64,
    pub retries: u64,
}

impl MetricsSnapshot {
    /// Outputs lost from the pool so far.
    pub fn dropped(&self) -> u64 {
        self.dropped_terminal + self.dropped_exhausted
    }
}

impl Metrics {
    /// Create new counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) -> u64 {
        self.submitted.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_dropped_terminal(&self) {
        self.dropped_terminal.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_exhausted(&self) {
        self.dropped_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Total submitted so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dropped_terminal: self.dropped_terminal.load(Ordering::Relaxed),
            dropped_exhausted: self.dropped_exhausted.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

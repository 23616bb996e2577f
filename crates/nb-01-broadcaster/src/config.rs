//! Configuration types for the broadcaster

use std::time::Duration;

use crate::error::{BroadcastError, Result};

/// When a run stops. At least one bound must be set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunBudget {
    /// Wall-clock length of the run, measured from the first tick.
    pub max_duration: Option<Duration>,
    /// Successful submissions after which the run stops.
    pub max_transactions: Option<u64>,
}

impl RunBudget {
    /// Budget bounded by time only.
    pub fn duration(d: Duration) -> Self {
        Self {
            max_duration: Some(d),
            max_transactions: None,
        }
    }

    /// Budget bounded by count only.
    pub fn transactions(n: u64) -> Self {
        Self {
            max_duration: None,
            max_transactions: Some(n),
        }
    }

    /// Whether any bound is set.
    pub fn is_bounded(&self) -> bool {
        self.max_duration.is_some() || self.max_transactions.is_some()
    }
}

/// Runtime configuration for the broadcaster
#[derive(Clone, Debug)]
pub struct BroadcasterConfig {
    /// Target submissions per second
    pub rate_per_second: u32,

    /// Stop conditions
    pub budget: RunBudget,

    /// Fee deducted from every self-paying transaction
    pub fee_sat: u64,

    /// Pool capacity
    pub pool_capacity: usize,

    /// Attempts per output before it is dropped
    pub max_attempts: u32,

    /// Pause between attempts on a transient failure
    pub retry_pause: Duration,

    /// Period of the status log
    pub stats_interval: Duration,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            rate_per_second: 5,
            budget: RunBudget::duration(Duration::from_secs(600)),
            fee_sat: crate::DEFAULT_FEE_SAT,
            pool_capacity: crate::DEFAULT_POOL_CAPACITY,
            max_attempts: 3,
            retry_pause: Duration::from_millis(50),
            stats_interval: Duration::from_secs(5),
        }
    }
}

impl BroadcasterConfig {
    /// Time between submission ticks.
    pub fn submission_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.rate_per_second.max(1)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_per_second == 0 || self.rate_per_second > 1_000_000 {
            return Err(BroadcastError::InvalidConfig(format!(
                "rate_per_second must be in 1..=1000000, got {}",
                self.rate_per_second
            )));
        }
        if !self.budget.is_bounded() {
            return Err(BroadcastError::InvalidConfig(
                "budget needs a duration or a transaction limit".into(),
            ));
        }
        if self.pool_capacity == 0 {
            return Err(BroadcastError::InvalidConfig(
                "pool_capacity must be > 0".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(BroadcastError::InvalidConfig(
                "max_attempts must be > 0".into(),
            ));
        }
        if self.stats_interval.is_zero() {
            return Err(BroadcastError::InvalidConfig(
                "stats_interval must be > 0".into(),
            ));
        }
        Ok(())
    }
}

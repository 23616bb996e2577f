//! Miner simulator configuration

use std::time::Duration;

/// Runtime configuration for the miner simulator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MinerConfig {
    /// Mean inter-block interval τ. `None` or zero disables the simulator.
    pub mean_interval: Option<Duration>,
}

impl MinerConfig {
    pub fn every(mean_interval: Duration) -> Self {
        Self {
            mean_interval: Some(mean_interval),
        }
    }

    /// τ, if the simulator should run.
    pub fn enabled_interval(&self) -> Option<Duration> {
        self.mean_interval.filter(|d| !d.is_zero())
    }
}

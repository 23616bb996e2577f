//! # Harness Configuration
//!
//! Unified configuration for both pipelines and the process itself.

use chrono::{DateTime, Utc};
use thiserror::Error;

use bench_telemetry::TelemetryConfig;
use nb_01_broadcaster::{BroadcastError, BroadcasterConfig};
use nb_02_block_listener::{ListenerConfig, MEASUREMENT_TARGET};
use nb_03_miner_simulator::MinerConfig;
use nb_04_node_client::RpcConfig;
use shared_bus::{BusConfig, BusError};

/// Default number of outputs prepared before broadcasting.
pub const DEFAULT_UTXO_TARGET: usize = 2_000;

/// Complete harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Node RPC endpoint and chain family.
    pub rpc: RpcConfig,
    /// Event feed endpoint.
    pub bus: BusConfig,
    pub broadcaster: BroadcasterConfig,
    pub listener: ListenerConfig,
    pub miner: MinerConfig,
    pub telemetry: TelemetryConfig,
    /// Outputs to prepare before the first submission.
    pub utxo_target: usize,
    /// Broadcaster and miner wait until this time.
    pub start_at: Option<DateTime<Utc>>,
    /// Skip preparation and broadcasting entirely.
    pub listen_only: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            bus: BusConfig::default(),
            broadcaster: BroadcasterConfig::default(),
            listener: ListenerConfig::default(),
            miner: MinerConfig::default(),
            telemetry: TelemetryConfig::default().with_measurement_target(MEASUREMENT_TARGET),
            utxo_target: DEFAULT_UTXO_TARGET,
            start_at: None,
            listen_only: false,
        }
    }
}

impl HarnessConfig {
    /// Validate everything the run will use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc.validate().map_err(ConfigError::Rpc)?;
        self.bus.validate()?;
        if self.listen_only {
            return Ok(());
        }
        self.broadcaster.validate()?;
        if self.utxo_target == 0 {
            return Err(ConfigError::UtxoTarget {
                target: 0,
                capacity: self.broadcaster.pool_capacity,
            });
        }
        if self.utxo_target > self.broadcaster.pool_capacity {
            return Err(ConfigError::UtxoTarget {
                target: self.utxo_target,
                capacity: self.broadcaster.pool_capacity,
            });
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("rpc: {0}")]
    Rpc(String),

    #[error("event feed: {0}")]
    Bus(#[from] BusError),

    #[error("broadcaster: {0}")]
    Broadcaster(#[from] BroadcastError),

    #[error("utxo target {target} must be between 1 and the pool capacity {capacity}")]
    UtxoTarget { target: usize, capacity: usize },
}

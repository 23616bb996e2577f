//! Command line interface

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;

use bench_telemetry::TelemetryConfig;
use nb_01_broadcaster::{BroadcasterConfig, RunBudget, DEFAULT_FEE_SAT};
use nb_02_block_listener::{ListenerConfig, MEASUREMENT_TARGET};
use nb_03_miner_simulator::MinerConfig;
use nb_04_node_client::{Backend, RpcConfig, DEFAULT_RPC_PORT};
use shared_bus::BusConfig;

use crate::config::{ConfigError, HarnessConfig, DEFAULT_UTXO_TARGET};

/// Default event feed port
pub const DEFAULT_ZMQ_PORT: u16 = 29000;

/// node-bench: transaction load and block propagation measurement
#[derive(Parser, Debug)]
#[command(name = "node-bench")]
#[command(about = "Broadcast self-paying transactions at a fixed rate and measure block propagation")]
#[command(version)]
pub struct Cli {
    /// Chain family of the node: btc or bsv
    #[arg(long, default_value = "btc")]
    pub blockchain: Backend,

    /// Node host (RPC and event feed)
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Node RPC port
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    #[arg(long, env = "NB_RPC_USER", default_value = "bitcoin")]
    pub rpc_user: String,

    #[arg(long, env = "NB_RPC_PASSWORD", default_value = "bitcoin", hide_env_values = true)]
    pub rpc_password: String,

    /// Event feed (ZeroMQ) port
    #[arg(long, default_value_t = DEFAULT_ZMQ_PORT)]
    pub zmq_port: u16,

    /// Submission rate in transactions per second
    #[arg(long, default_value_t = 5)]
    pub rate: u32,

    /// Stop after this many successful submissions
    #[arg(long)]
    pub limit: Option<u64>,

    /// Stop after this long, e.g. 30s, 10m, 1h30m
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Mean interval between simulated blocks; 0 disables block generation
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    pub gen_blocks: Duration,

    /// Start time, RFC 3339 (e.g. 2024-12-02T21:16:00+01:00)
    #[arg(long)]
    pub start_at: Option<DateTime<Utc>>,

    /// Measurement log file
    #[arg(long, default_value = "output.log")]
    pub output: PathBuf,

    /// Outputs to prepare before broadcasting
    #[arg(long, default_value_t = DEFAULT_UTXO_TARGET)]
    pub utxos: usize,

    /// Fee per transaction in satoshis
    #[arg(long, default_value_t = DEFAULT_FEE_SAT)]
    pub fee: u64,

    /// Ignore blocks announced within this window after the listener starts
    #[arg(long, value_parser = parse_duration, default_value = "0")]
    pub warmup: Duration,

    /// Block hash never to measure (repeatable)
    #[arg(long = "ignore-hash")]
    pub ignore_hashes: Vec<String>,

    /// Console log filter
    #[arg(long, env = "NB_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Only run the listening pipeline
    #[arg(long)]
    pub listen_only: bool,
}

impl Cli {
    /// Build and validate the harness configuration.
    ///
    /// Without `--limit` or `--duration` the broadcaster's default budget
    /// applies.
    pub fn into_config(self) -> Result<HarnessConfig, ConfigError> {
        let rpc = RpcConfig {
            host: self.host.clone(),
            port: self.rpc_port,
            user: self.rpc_user,
            password: self.rpc_password,
            backend: self.blockchain,
            fee_sat: self.fee,
            ..RpcConfig::default()
        };

        let mut broadcaster = BroadcasterConfig {
            rate_per_second: self.rate,
            fee_sat: self.fee,
            ..BroadcasterConfig::default()
        };
        let budget = RunBudget {
            max_duration: self.duration,
            max_transactions: self.limit,
        };
        if budget.is_bounded() {
            broadcaster.budget = budget;
        }

        let config = HarnessConfig {
            rpc,
            bus: BusConfig::for_endpoint(&self.host, self.zmq_port),
            broadcaster,
            listener: ListenerConfig::default()
                .with_warmup(self.warmup)
                .ignore(self.ignore_hashes),
            miner: MinerConfig::every(self.gen_blocks),
            telemetry: TelemetryConfig::from_env()
                .with_log_level(self.log_level)
                .with_measurement_file(self.output)
                .with_measurement_target(MEASUREMENT_TARGET),
            utxo_target: self.utxos,
            start_at: self.start_at,
            listen_only: self.listen_only,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse `90`, `500ms`, `30s`, `10m`, `1h30m` and similar.
///
/// A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in '{input}'"))?;
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number in '{input}'"))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let nanos_per_unit: u64 = match unit {
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            other => return Err(format!("unknown unit '{other}' in '{input}'")),
        };

        let nanos = (value * nanos_per_unit as f64).round();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Err(format!("'{input}' is out of range"));
        }
        total += Duration::from_nanos(nanos as u64);
        rest = next;
    }
    Ok(total)
}

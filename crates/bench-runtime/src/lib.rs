//! # Node Bench Runtime
//!
//! Configuration, command line and wiring for the `node-bench` binary.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags into a [`HarnessConfig`] and validate it
//! 2. Install telemetry (console plus measurement file)
//! 3. Connect the node backend and log its state
//! 4. Prepare spendable outputs (skipped with `--listen-only`)
//! 5. Start the listening pipeline
//! 6. Broadcast until the budget is spent or Ctrl+C
//! 7. Cancel and join everything, log the run report

pub mod cli;
pub mod config;
pub mod runtime;

pub use cli::{parse_duration, Cli};
pub use config::{ConfigError, HarnessConfig};
pub use runtime::{spawn_listening, HarnessReport, HarnessRuntime, ListeningPipeline, PipelineReport};

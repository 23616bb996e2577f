//! # Bench Telemetry
//!
//! Logging setup for the harness binary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bench_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env().with_measurement_file("output.log");
//! let _guard = init_telemetry(config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NB_LOG_LEVEL` / `RUST_LOG` | `info` | Console filter |
//! | `NB_JSON_LOGS` | `false` (`true` in containers) | JSON console output |
//! | `NB_CONSOLE_OUTPUT` | `true` | Disable to log measurements only |
//! | `NB_OUTPUT` | unset | Measurement file |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_layers, BoxedLayer};

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Cannot open output file {path}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let layers = build_layers(&config)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json = config.json_logs,
        output = ?config.measurement_file,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        measurement_file: config.measurement_file,
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    measurement_file: Option<PathBuf>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(output = ?self.measurement_file, "Shutting down telemetry");
    }
}

//! Subscriber layers.
//!
//! Two independent sinks share one registry:
//! - the console, filtered by `EnvFilter`;
//! - the measurement file, which only sees events on the measurement target
//!   at `INFO` or above, regardless of the console filter.

use std::fs::{create_dir_all, OpenOptions};
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::{TelemetryConfig, TelemetryError};

/// Layer type accepted by the registry.
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Build the configured layers without installing them.
pub fn build_layers(config: &TelemetryConfig) -> Result<Vec<BoxedLayer>, TelemetryError> {
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(2);

    if config.console_output {
        let filter = EnvFilter::try_new(&config.log_level)
            .map_err(|e| TelemetryError::Filter(format!("{}: {e}", config.log_level)))?;

        let console: BoxedLayer = if config.json_logs {
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_filter(filter)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };
        layers.push(console);
    }

    if let Some(path) = &config.measurement_file {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_dir_all(dir).map_err(|source| TelemetryError::OutputFile {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| TelemetryError::OutputFile {
                path: path.clone(),
                source,
            })?;

        let measurements: BoxedLayer = tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(false)
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(Mutex::new(file))
            .with_filter(Targets::new().with_target(config.measurement_target.clone(), Level::INFO))
            .boxed();
        layers.push(measurements);
    }

    Ok(layers)
}

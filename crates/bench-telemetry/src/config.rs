//! Telemetry configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Configuration for console and measurement logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup record
    pub service_name: String,

    /// Filter directives (trace, debug, info, warn, error, or full
    /// `EnvFilter` syntax)
    pub log_level: String,

    /// Whether to write to stdout at all
    pub console_output: bool,

    /// JSON console output instead of the human format
    pub json_logs: bool,

    /// File receiving measurement records, appended as JSON lines
    pub measurement_file: Option<PathBuf>,

    /// Tracing target routed to `measurement_file`
    pub measurement_target: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "node-bench".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            measurement_file: None,
            measurement_target: "measurements".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NB_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `NB_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `NB_OUTPUT`: Measurement log file (default: none)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            log_level: env::var("NB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("NB_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("NB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),

            measurement_file: env::var_os("NB_OUTPUT").map(PathBuf::from),

            ..Self::default()
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_measurement_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.measurement_file = Some(path.into());
        self
    }

    pub fn with_measurement_target(mut self, target: impl Into<String>) -> Self {
        self.measurement_target = target.into();
        self
    }
}

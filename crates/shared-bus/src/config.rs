//! Event bus configuration.

use std::time::Duration;

use crate::{BusError, Result};

/// Configuration for [`crate::EventBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Publish endpoint, e.g. `tcp://127.0.0.1:29000`.
    pub endpoint: String,
    /// Capacity of the subscribe/unsubscribe request queue.
    pub request_queue_capacity: usize,
    /// Connect attempts before the initial connection is declared failed.
    pub initial_connect_attempts: u32,
    /// Pause between connect attempts.
    pub connect_retry_interval: Duration,
    /// Pause after losing a working connection before reconnecting.
    pub reconnect_delay: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:29000".to_string(),
            request_queue_capacity: 10,
            initial_connect_attempts: 5,
            connect_retry_interval: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(10),
        }
    }
}

impl BusConfig {
    /// Build a config for `host:port` with default timings.
    pub fn for_endpoint(host: &str, port: u16) -> Self {
        Self {
            endpoint: format!("tcp://{host}:{port}"),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(BusError::InvalidConfig("endpoint is empty".into()));
        }
        if self.request_queue_capacity == 0 {
            return Err(BusError::InvalidConfig(
                "request_queue_capacity must be > 0".into(),
            ));
        }
        if self.initial_connect_attempts == 0 {
            return Err(BusError::InvalidConfig(
                "initial_connect_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.request_queue_capacity, 10);
        assert_eq!(config.initial_connect_attempts, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_endpoint() {
        let config = BusConfig::for_endpoint("10.0.0.2", 28332);
        assert_eq!(config.endpoint, "tcp://10.0.0.2:28332");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = BusConfig {
            initial_connect_attempts: 0,
            ..BusConfig::default()
        };
        assert!(matches!(config.validate(), Err(BusError::InvalidConfig(_))));
    }
}

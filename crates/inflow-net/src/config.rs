//! Source configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the adapter can run with zero
//! configuration against a local backend.

use std::time::Duration;

use inflow_shared::constants::{
    DEFAULT_API_URL, DEFAULT_PENDING_RETENTION_SECS, DEFAULT_POLL_INTERVAL_SECS,
};

/// Event source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the backend API.
    /// Env: `API_BASE_URL`
    /// Default: `http://localhost:8000`
    pub base_url: String,

    /// Interval between snapshot polls.
    /// Env: `POLL_INTERVAL_SECS`
    /// Default: 3 seconds.
    pub poll_interval: Duration,

    /// How long a buffered status may wait for its message before being
    /// evicted.
    /// Env: `PENDING_RETENTION_SECS`
    /// Default: 15 minutes.
    pub pending_retention: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            pending_retention: Duration::from_secs(DEFAULT_PENDING_RETENTION_SECS),
        }
    }
}

impl SourceConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("API_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }

        if let Ok(val) = std::env::var("POLL_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.poll_interval = Duration::from_secs(secs),
                _ => {
                    tracing::warn!(value = %val, "Invalid POLL_INTERVAL_SECS, using default");
                }
            }
        }

        if let Ok(val) = std::env::var("PENDING_RETENTION_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.pending_retention = Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid PENDING_RETENTION_SECS, using default");
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.pending_retention, Duration::from_secs(900));
    }
}

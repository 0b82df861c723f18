//! Configuration for the orchestrator.
//!
//! This module provides the defaults applied by [`Execution`] when a caller
//! leaves an option unspecified.
//!
//! [`Execution`]: crate::execution::Execution

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Environment variable read by [`ExecutionConfig::from_env`].
pub const DEFAULT_TIMEOUT_ENV: &str = "EXEC_TOOLKIT_DEFAULT_TIMEOUT_MS";

/// Deadline applied by `wait_for_all` when no timeout is given.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} (expected a positive integer)")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Configuration for orchestrator execution.
///
/// # Examples
///
/// ```
/// use exec_toolkit::execution::ExecutionConfig;
/// use std::time::Duration;
///
/// let config = ExecutionConfig::new()
///     .with_default_timeout(Duration::from_secs(5))
///     .with_log_timeouts(false);
///
/// assert_eq!(config.default_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Deadline for `wait_for_all` when the caller passes no timeout. Must be
    /// positive; `wait_for_all` rejects with invalid arguments otherwise.
    ///
    /// **Default:** 60000 (one minute)
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Log a warning for every key still pending when a deadline elapses.
    ///
    /// **Default:** `true`
    #[serde(default = "default_true")]
    pub log_timeouts: bool,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            log_timeouts: true,
        }
    }

    /// Builds a configuration from the environment.
    ///
    /// Unset variables keep their defaults; a malformed or zero timeout is an
    /// error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Ok(raw) = env::var(DEFAULT_TIMEOUT_ENV) {
            config.default_timeout_ms = parse_timeout(&raw)?;
        }
        Ok(config)
    }

    /// Sets the default deadline. Sub-millisecond precision is dropped.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_log_timeouts(mut self, enable: bool) -> Self {
        self.log_timeouts = enable;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

fn parse_timeout(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(ms),
        _ => Err(ConfigError::InvalidTimeout {
            name: DEFAULT_TIMEOUT_ENV,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExecutionConfig::default();
        assert_eq!(config.default_timeout_ms, 60_000);
        assert_eq!(config.default_timeout(), Duration::from_secs(60));
        assert!(config.log_timeouts);
    }

    #[test]
    fn test_builder_chain() {
        let config = ExecutionConfig::new()
            .with_default_timeout(Duration::from_millis(250))
            .with_log_timeouts(false);

        assert_eq!(config.default_timeout_ms, 250);
        assert!(!config.log_timeouts);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: ExecutionConfig = serde_json::from_str(r#"{"log_timeouts": false}"#).unwrap();
        assert_eq!(config.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!config.log_timeouts);
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout(" 1500 "), Ok(1500));
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn test_config_error_message() {
        let error = parse_timeout("-1").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid value for EXEC_TOOLKIT_DEFAULT_TIMEOUT_MS: \"-1\" (expected a positive integer)"
        );
    }
}

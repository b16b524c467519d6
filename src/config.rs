//! Coordinator configuration.
//!
//! Connection URL, key prefix and the bounded wait used by blocking dequeues.
//! Values come from defaults, `with_*` builders or `WORKQ_*` environment
//! variables.

use std::time::Duration;
use thiserror::Error;

/// Default Redis connection URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "work:";

/// Default bounded wait of a single blocking pop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a `WorkQueuing` coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuingConfig {
    /// Redis connection URL.
    pub redis_url: String,
    /// Prefix put in front of every store key.
    pub prefix: String,
    /// Upper bound of one blocking pop; cancellation is checked between waits.
    pub poll_interval: Duration,
}

impl Default for QueuingConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl QueuingConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WORKQ_REDIS_URL`: Redis connection URL (default: redis://127.0.0.1:6379)
    /// - `WORKQ_PREFIX`: Store key prefix (default: work:)
    /// - `WORKQ_POLL_INTERVAL_MS`: Bounded wait of a blocking pop (default: 1000)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("WORKQ_REDIS_URL") {
            config.redis_url = val;
        }

        if let Ok(val) = std::env::var("WORKQ_PREFIX") {
            config.prefix = val;
        }

        if let Ok(val) = std::env::var("WORKQ_POLL_INTERVAL_MS") {
            let millis: u64 = parse_env_value(&val, "WORKQ_POLL_INTERVAL_MS")?;
            config.poll_interval = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "redis_url cannot be empty".to_string(),
            ));
        }

        if !self.redis_url.starts_with("redis://")
            && !self.redis_url.starts_with("rediss://")
            && !self.redis_url.starts_with("unix://")
        {
            return Err(ConfigError::ValidationFailed(format!(
                "redis_url must use redis://, rediss:// or unix://, got '{}'",
                self.redis_url
            )));
        }

        if self.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(
                "prefix cannot contain whitespace".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Sets the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Sets the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the bounded wait of a blocking pop.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

//! # Notification Core Configuration
//!
//! Typed configuration for the engine, loaded in layers by [`ConfigManager`]:
//! built-in defaults, then `config/notification.toml`, then an optional
//! per-environment file (`config/notification.<env>.toml`), then `NOTIFY__`
//! environment variables. The merged result is validated before use.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use notification_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let attempts = manager.config().retry.max_attempts;
//! let timeout = manager.config().engine.provider_call_timeout();
//! # let _ = (attempts, timeout);
//! # Ok(())
//! # }
//! ```
//!
//! Environment overrides use `__` between segments, for example
//! `NOTIFY__RETRY__MAX_ATTEMPTS=5` or `NOTIFY__WORKERS__CONCURRENCY_PER_CHANNEL=8`.

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring config/notification.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NotificationConfig {
    pub engine: EngineConfig,
    pub retry: RetryConfig,
    pub workers: WorkerConfig,
    pub cache: CacheConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Language used when a request names none, and the render fallback
    pub default_language: String,
    /// Upper bound on a single provider call; exceeding it is a transient failure
    pub provider_call_timeout_ms: u64,
    /// Delay before a claim deferred by a store outage is retried
    pub defer_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_language: crate::constants::system::DEFAULT_LANGUAGE.to_string(),
            provider_call_timeout_ms: 10_000,
            defer_delay_ms: 1_000,
        }
    }
}

impl EngineConfig {
    pub fn provider_call_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_call_timeout_ms)
    }

    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }
}

/// Backoff and retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempt ceiling, counting the first attempt
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of the uniform jitter added to every backoff
    pub jitter_window_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
            jitter_window_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency_per_channel: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency_per_channel: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long resolved tenant and channel configuration may be served from cache
    pub config_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            config_ttl_seconds: 60,
        }
    }
}

impl CacheConfig {
    pub fn config_ttl(&self) -> Duration {
        Duration::from_secs(self.config_ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Immediate retries of a ledger append before the write is reported failed
    pub write_retry_attempts: u32,
    pub write_retry_delay_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            write_retry_attempts: 3,
            write_retry_delay_ms: 50,
        }
    }
}

impl LedgerConfig {
    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit level; derived from the environment when absent
    pub level: Option<String>,
    /// Emit JSON records instead of the human-readable format
    pub json: bool,
}

impl NotificationConfig {
    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.default_language.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "engine.default_language",
                "engine configuration",
            ));
        }

        if self.engine.provider_call_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "engine.provider_call_timeout_ms",
                "0",
                "provider call timeout must be greater than 0",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.retry.base_delay_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.base_delay_ms",
                "0",
                "base delay must be greater than 0",
            ));
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.max_delay_ms",
                self.retry.max_delay_ms.to_string(),
                "cap must not be below the base delay",
            ));
        }

        if self.workers.concurrency_per_channel == 0 {
            return Err(ConfigurationError::invalid_value(
                "workers.concurrency_per_channel",
                "0",
                "each channel needs at least one worker",
            ));
        }

        if self.ledger.write_retry_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "ledger.write_retry_attempts",
                "0",
                "at least one ledger write attempt is required",
            ));
        }

        Ok(())
    }
}

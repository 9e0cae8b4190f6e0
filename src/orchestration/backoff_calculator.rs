//! # Backoff Calculator
//!
//! Computes retry delays for transient delivery failures.
//!
//! ## Overview
//!
//! The delay before attempt `n + 1` is `min(cap, base * 2^(n - 1))` plus a
//! uniformly random jitter in `[0, jitter_window]`. With the default
//! configuration that gives 1 s, 2 s, 4 s ... capped at 5 minutes.
//!
//! ## Key Features
//!
//! - **Exponential Backoff**: base delay doubling per attempt
//! - **Maximum Delay Caps**: the deterministic part never exceeds the cap
//! - **Jitter Support**: bounded uniform jitter spreads retries apart
//! - **Attempt Ceiling**: `should_retry` tells the scheduler when to dead-letter

use crate::config::NotificationConfig;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for backoff calculation behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffCalculatorConfig {
    pub base_delay_ms: u64,
    /// Cap on the exponential part of the delay
    pub max_delay_ms: u64,
    /// Jitter is drawn uniformly from `0..=jitter_window_ms`
    pub jitter_window_ms: u64,
    /// Attempt ceiling, counting the first attempt
    pub max_attempts: u32,
}

impl Default for BackoffCalculatorConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 300_000, // 5 minutes
            jitter_window_ms: 500,
            max_attempts: 3,
        }
    }
}

impl BackoffCalculatorConfig {
    /// Create BackoffCalculatorConfig from the loaded configuration
    pub fn from_config(config: &NotificationConfig) -> Self {
        Self {
            base_delay_ms: config.retry.base_delay_ms,
            max_delay_ms: config.retry.max_delay_ms,
            jitter_window_ms: config.retry.jitter_window_ms,
            max_attempts: config.retry.max_attempts,
        }
    }
}

/// Result of a backoff calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffResult {
    /// Attempt that just failed
    pub attempt: u32,
    pub base_delay_ms: u64,
    pub jitter_ms: u64,
    /// Total delay before the next attempt
    pub delay_ms: u64,
    pub backoff_type: BackoffType,
    pub next_retry_at: DateTime<Utc>,
}

impl BackoffResult {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Type of backoff calculation applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffType {
    /// Still on the exponential curve
    Exponential,
    /// Exponential part clamped to the cap
    Capped,
}

/// Stateless backoff policy shared by every worker
#[derive(Debug, Clone, Default)]
pub struct BackoffCalculator {
    config: BackoffCalculatorConfig,
}

impl BackoffCalculator {
    pub fn new(config: BackoffCalculatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BackoffCalculatorConfig {
        &self.config
    }

    /// Whether a task with `attempts` made so far may be retried
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.config.max_attempts
    }

    /// Deterministic part of the delay after the given (1-based) attempt
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms)
    }

    /// Calculate the delay before the attempt following `attempt`
    pub fn calculate(&self, attempt: u32) -> BackoffResult {
        let base_delay_ms = self.base_delay_ms(attempt);
        let jitter_ms = self.jitter_ms();
        let delay_ms = base_delay_ms.saturating_add(jitter_ms);
        let backoff_type = if base_delay_ms >= self.config.max_delay_ms {
            BackoffType::Capped
        } else {
            BackoffType::Exponential
        };

        BackoffResult {
            attempt,
            base_delay_ms,
            jitter_ms,
            delay_ms,
            backoff_type,
            next_retry_at: Utc::now()
                + chrono::Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX)),
        }
    }

    fn jitter_ms(&self) -> u64 {
        if self.config.jitter_window_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..=self.config.jitter_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_jitter() -> BackoffCalculator {
        BackoffCalculator::new(BackoffCalculatorConfig {
            jitter_window_ms: 0,
            ..Default::default()
        })
    }

    #[test]
    fn test_backoff_config_default() {
        let config = BackoffCalculatorConfig::default();
        assert_eq!(config.base_delay_ms, 1_000);
        assert_eq!(config.max_delay_ms, 300_000);
        assert_eq!(config.jitter_window_ms, 500);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_exponential_growth_until_cap() {
        let calculator = without_jitter();
        assert_eq!(calculator.base_delay_ms(1), 1_000);
        assert_eq!(calculator.base_delay_ms(2), 2_000);
        assert_eq!(calculator.base_delay_ms(3), 4_000);
        assert_eq!(calculator.base_delay_ms(9), 256_000);
        assert_eq!(calculator.base_delay_ms(10), 300_000);
        assert_eq!(calculator.base_delay_ms(200), 300_000);
    }

    #[test]
    fn test_jitter_stays_in_window() {
        let calculator = BackoffCalculator::default();
        for _ in 0..100 {
            let result = calculator.calculate(2);
            assert_eq!(result.base_delay_ms, 2_000);
            assert!(result.jitter_ms <= 500);
            assert_eq!(result.delay_ms, result.base_delay_ms + result.jitter_ms);
        }
    }

    #[test]
    fn test_capped_type_reported() {
        let calculator = without_jitter();
        assert_eq!(calculator.calculate(1).backoff_type, BackoffType::Exponential);
        assert_eq!(calculator.calculate(12).backoff_type, BackoffType::Capped);
    }

    #[test]
    fn test_should_retry_respects_ceiling() {
        let calculator = BackoffCalculator::default();
        assert!(calculator.should_retry(1));
        assert!(calculator.should_retry(2));
        assert!(!calculator.should_retry(3));
    }
}

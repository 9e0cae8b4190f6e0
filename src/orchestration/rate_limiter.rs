//! Per-(tenant, channel) token buckets.
//!
//! A claim that finds its bucket empty is put back on the queue for the
//! time the next token needs; no delivery attempt is consumed.

use crate::constants::ChannelKind;
use crate::models::RateLimit;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Shortest wait handed back, so a deferred claim never spins
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct TokenBucket {
    limit: RateLimit,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limit: RateLimit, now: Instant) -> Self {
        Self {
            limit,
            tokens: f64::from(limit.max_per_window),
            last_refill: now,
        }
    }

    fn refill_per_ms(&self) -> f64 {
        f64::from(self.limit.max_per_window) / self.limit.window_ms.max(1) as f64
    }

    fn refill(&mut self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.last_refill).as_secs_f64() * 1_000.0;
        let capacity = f64::from(self.limit.max_per_window);
        self.tokens = (self.tokens + elapsed_ms * self.refill_per_ms()).min(capacity);
        self.last_refill = now;
    }

    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        let rate = self.refill_per_ms();
        if rate <= 0.0 {
            return Err(self.limit.window().max(MIN_WAIT));
        }
        let wait_ms = ((1.0 - self.tokens) / rate).ceil().max(1.0);
        Err(Duration::from_millis(wait_ms as u64))
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<(String, ChannelKind), TokenBucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one send permit, or return how long until one is available.
    ///
    /// A changed limit replaces the bucket with a full one.
    pub fn try_acquire(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
        limit: &RateLimit,
    ) -> Result<(), Duration> {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry((tenant_id.to_string(), channel))
            .or_insert_with(|| TokenBucket::new(*limit, now));
        if bucket.limit != *limit {
            *bucket = TokenBucket::new(*limit, now);
        }
        bucket.try_take(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills_over_window() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            max_per_window: 2,
            window_ms: 1_000,
        };

        assert!(limiter.try_acquire("acme", ChannelKind::Sms, &limit).is_ok());
        assert!(limiter.try_acquire("acme", ChannelKind::Sms, &limit).is_ok());
        let wait = limiter
            .try_acquire("acme", ChannelKind::Sms, &limit)
            .unwrap_err();
        assert_eq!(wait, Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire("acme", ChannelKind::Sms, &limit).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_are_isolated_per_tenant_and_channel() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            max_per_window: 1,
            window_ms: 60_000,
        };

        assert!(limiter.try_acquire("acme", ChannelKind::Sms, &limit).is_ok());
        assert!(limiter.try_acquire("acme", ChannelKind::Sms, &limit).is_err());
        assert!(limiter.try_acquire("acme", ChannelKind::Email, &limit).is_ok());
        assert!(limiter.try_acquire("globex", ChannelKind::Sms, &limit).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_waits_a_window() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            max_per_window: 0,
            window_ms: 2_000,
        };
        assert_eq!(
            limiter.try_acquire("acme", ChannelKind::Push, &limit),
            Err(Duration::from_millis(2_000))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_degenerate_limit_never_returns_zero_wait() {
        let limiter = RateLimiter::new();
        let limit = RateLimit {
            max_per_window: 0,
            window_ms: 0,
        };
        for _ in 0..3 {
            assert_eq!(
                limiter.try_acquire("acme", ChannelKind::Push, &limit),
                Err(Duration::from_millis(1))
            );
        }
    }
}

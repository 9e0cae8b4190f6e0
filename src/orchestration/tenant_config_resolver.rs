//! # Tenant Config Resolver
//!
//! Resolves the channel configuration for a (tenant, channel) pair with a
//! bounded-staleness cache in front of the configuration store.
//!
//! Cache entries are immutable `Arc`s swapped in whole, so a reader sees
//! either the old or the new configuration and never a mix. Entries older
//! than the TTL are refetched; updates in the store become visible within
//! one TTL.

use crate::constants::ChannelKind;
use crate::error::{NotificationError, Result};
use crate::models::{ChannelConfig, Tenant};
use crate::store::ConfigurationStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct CacheEntry<T> {
    value: Option<T>,
    fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

pub struct TenantConfigResolver {
    store: Arc<dyn ConfigurationStore>,
    ttl: Duration,
    tenants: DashMap<String, Arc<CacheEntry<Tenant>>>,
    channel_configs: DashMap<(String, ChannelKind), Arc<CacheEntry<ChannelConfig>>>,
}

impl TenantConfigResolver {
    pub fn new(store: Arc<dyn ConfigurationStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            tenants: DashMap::new(),
            channel_configs: DashMap::new(),
        }
    }

    /// Look up a tenant, served from cache within the TTL
    pub async fn tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        if let Some(entry) = self.tenants.get(tenant_id).map(|e| e.clone()) {
            if entry.is_fresh(self.ttl) {
                return Ok(entry.value.clone());
            }
        }

        let value = self.store.get_tenant(tenant_id).await?;
        self.tenants.insert(
            tenant_id.to_string(),
            Arc::new(CacheEntry {
                value: value.clone(),
                fetched_at: Instant::now(),
            }),
        );
        Ok(value)
    }

    pub async fn tenant_exists(&self, tenant_id: &str) -> Result<bool> {
        Ok(self.tenant(tenant_id).await?.is_some())
    }

    /// Resolve the configuration a worker needs to dispatch on `channel`.
    ///
    /// Fails with `TenantSuspended` when the tenant is suspended and with
    /// `ConfigNotFound` when the tenant is unknown, has not configured the
    /// channel, or configured a rate limit that admits no sends.
    pub async fn resolve(&self, tenant_id: &str, channel: ChannelKind) -> Result<ChannelConfig> {
        let not_found = || NotificationError::ConfigNotFound {
            tenant_id: tenant_id.to_string(),
            channel,
        };

        let tenant = self.tenant(tenant_id).await?.ok_or_else(not_found)?;
        if !tenant.is_active() {
            return Err(NotificationError::TenantSuspended {
                tenant_id: tenant_id.to_string(),
            });
        }
        if !tenant.has_channel(channel) {
            return Err(not_found());
        }

        let key = (tenant_id.to_string(), channel);
        if let Some(entry) = self.channel_configs.get(&key).map(|e| e.clone()) {
            if entry.is_fresh(self.ttl) {
                return usable(entry.value.clone()).ok_or_else(not_found);
            }
        }

        debug!(tenant_id = %tenant_id, channel = %channel, "Refreshing channel configuration");
        let value = self.store.get_channel_config(tenant_id, channel).await?;
        self.channel_configs.insert(
            key,
            Arc::new(CacheEntry {
                value: value.clone(),
                fetched_at: Instant::now(),
            }),
        );
        usable(value).ok_or_else(not_found)
    }

    /// Drop cached entries for a tenant so the next read goes to the store
    pub fn invalidate(&self, tenant_id: &str) {
        self.tenants.remove(tenant_id);
        self.channel_configs.retain(|(tenant, _), _| tenant != tenant_id);
    }

    pub fn invalidate_channel(&self, tenant_id: &str, channel: ChannelKind) {
        self.channel_configs.remove(&(tenant_id.to_string(), channel));
    }
}

/// The configuration, unless its rate limit can never admit a send
fn usable(config: Option<ChannelConfig>) -> Option<ChannelConfig> {
    let config = config?;
    match config.rate_limit {
        Some(limit) if !limit.is_usable() => {
            warn!(
                tenant_id = %config.tenant_id,
                channel = %config.channel,
                max_per_window = limit.max_per_window,
                window_ms = limit.window_ms,
                "Channel configuration has an unusable rate limit"
            );
            None
        }
        _ => Some(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateLimit;
    use crate::store::InMemoryConfigurationStore;

    fn store() -> Arc<InMemoryConfigurationStore> {
        let store = Arc::new(InMemoryConfigurationStore::new());
        store.put_tenant(Tenant::new("acme", "Acme").with_channel(ChannelKind::Sms));
        store.put_channel_config(ChannelConfig::new("acme", ChannelKind::Sms, "twilio", "cred-1"));
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_within_ttl_and_refreshed_after() {
        let store = store();
        let resolver = TenantConfigResolver::new(store.clone(), Duration::from_secs(60));

        let first = resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        assert_eq!(first.provider_id, "twilio");

        store.put_channel_config(
            ChannelConfig::new("acme", ChannelKind::Sms, "vonage", "cred-2")
                .with_rate_limit(RateLimit::per_second(5)),
        );
        let cached = resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        assert_eq!(cached.provider_id, "twilio");
        assert_eq!(store.channel_config_reads(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let refreshed = resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        assert_eq!(refreshed.provider_id, "vonage");
        assert_eq!(store.channel_config_reads(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_channel_is_not_found() {
        let resolver = TenantConfigResolver::new(store(), Duration::from_secs(60));
        let result = resolver.resolve("acme", ChannelKind::Push).await;
        assert!(matches!(result, Err(NotificationError::ConfigNotFound { .. })));

        let unknown = resolver.resolve("globex", ChannelKind::Sms).await;
        assert!(matches!(unknown, Err(NotificationError::ConfigNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unusable_rate_limit_is_not_found() {
        let store = store();
        let resolver = TenantConfigResolver::new(store.clone(), Duration::from_secs(60));
        for limit in [
            RateLimit {
                max_per_window: 0,
                window_ms: 1_000,
            },
            RateLimit {
                max_per_window: 5,
                window_ms: 0,
            },
        ] {
            store.put_channel_config(
                ChannelConfig::new("acme", ChannelKind::Sms, "twilio", "cred-1")
                    .with_rate_limit(limit),
            );
            resolver.invalidate_channel("acme", ChannelKind::Sms);
            let result = resolver.resolve("acme", ChannelKind::Sms).await;
            assert!(matches!(result, Err(NotificationError::ConfigNotFound { .. })));
        }
    }

    #[tokio::test]
    async fn test_suspended_tenant_rejected() {
        let store = store();
        store.put_tenant(
            Tenant::new("acme", "Acme")
                .with_channel(ChannelKind::Sms)
                .suspended(),
        );
        let resolver = TenantConfigResolver::new(store, Duration::from_secs(60));
        let result = resolver.resolve("acme", ChannelKind::Sms).await;
        assert!(matches!(result, Err(NotificationError::TenantSuspended { .. })));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = store();
        let resolver = TenantConfigResolver::new(store.clone(), Duration::from_secs(60));
        resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        resolver.invalidate("acme");
        resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        assert_eq!(store.channel_config_reads(), 2);

        resolver.invalidate_channel("acme", ChannelKind::Sms);
        resolver.resolve("acme", ChannelKind::Sms).await.unwrap();
        assert_eq!(store.channel_config_reads(), 3);
        assert!(resolver.tenant_exists("acme").await.unwrap());
        assert!(!resolver.tenant_exists("globex").await.unwrap());
    }
}

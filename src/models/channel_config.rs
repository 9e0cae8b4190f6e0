use crate::constants::ChannelKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-tenant, per-channel send rate ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub max_per_window: u32,
    pub window_ms: u64,
}

impl RateLimit {
    pub fn per_second(max: u32) -> Self {
        Self {
            max_per_window: max,
            window_ms: 1_000,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// A limit that admits no sends, or refills over no time, cannot be served
    pub fn is_usable(&self) -> bool {
        self.max_per_window > 0 && self.window_ms > 0
    }
}

/// Provider binding for one (tenant, channel) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub provider_id: String,
    /// Opaque handle resolved by the provider, never the secret itself
    pub credential_handle: String,
    pub rate_limit: Option<RateLimit>,
}

impl ChannelConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        channel: ChannelKind,
        provider_id: impl Into<String>,
        credential_handle: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            channel,
            provider_id: provider_id.into(),
            credential_handle: credential_handle.into(),
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

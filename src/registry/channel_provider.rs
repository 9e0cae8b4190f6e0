use crate::constants::ChannelKind;
use crate::models::{ChannelConfig, DeliveryOutcome, IdempotencyKey, RenderedContent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// External delivery integration for one channel kind.
///
/// Implementations never return errors: every failure is reported as a
/// transient or permanent [`DeliveryOutcome`]. The idempotency key is passed
/// through so providers that support deduplication can use it.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Channel this provider serves
    fn channel(&self) -> ChannelKind;

    /// Name used in logs and provider references
    fn name(&self) -> &str;

    /// Deliver rendered content to a single recipient
    async fn deliver(
        &self,
        config: &ChannelConfig,
        recipient: &str,
        content: &RenderedContent,
        idempotency_key: &IdempotencyKey,
    ) -> DeliveryOutcome;
}

/// Provider that accepts everything and only logs it.
///
/// Stands in for a real integration in development.
#[derive(Debug)]
pub struct LoggingProvider {
    channel: ChannelKind,
    name: String,
    sent: AtomicU64,
}

impl LoggingProvider {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            name: format!("logging-{}", channel.as_str().to_ascii_lowercase()),
            sent: AtomicU64::new(0),
        }
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChannelProvider for LoggingProvider {
    fn channel(&self) -> ChannelKind {
        self.channel
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(
        &self,
        config: &ChannelConfig,
        recipient: &str,
        content: &RenderedContent,
        idempotency_key: &IdempotencyKey,
    ) -> DeliveryOutcome {
        let sequence = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            provider = %self.name,
            channel = %self.channel,
            tenant_id = %config.tenant_id,
            provider_id = %config.provider_id,
            recipient = %recipient,
            template = %content.template_name,
            template_version = content.template_version,
            idempotency_key = %idempotency_key,
            "Delivering notification"
        );
        DeliveryOutcome::delivered(format!("{}-{sequence}", self.name))
    }
}

use super::channel_provider::ChannelProvider;
use crate::constants::ChannelKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry statistics for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_providers: usize,
    pub channels: Vec<ChannelKind>,
}

/// One provider per channel kind, fixed once the engine is built
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ChannelKind, Arc<dyn ChannelProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under the channel it reports, replacing any
    /// earlier provider for that channel
    pub fn register(&mut self, provider: Arc<dyn ChannelProvider>) {
        let channel = provider.channel();
        if let Some(previous) = self.providers.insert(channel, provider.clone()) {
            warn!(
                channel = %channel,
                previous = %previous.name(),
                replacement = %provider.name(),
                "Replacing registered channel provider"
            );
        } else {
            info!(channel = %channel, provider = %provider.name(), "Registered channel provider");
        }
    }

    pub fn get(&self, channel: ChannelKind) -> Option<Arc<dyn ChannelProvider>> {
        self.providers.get(&channel).cloned()
    }

    pub fn contains(&self, channel: ChannelKind) -> bool {
        self.providers.contains_key(&channel)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut channels: Vec<ChannelKind> = self.providers.keys().copied().collect();
        channels.sort();
        RegistryStats {
            total_providers: self.providers.len(),
            channels,
        }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("channels", &self.stats().channels)
            .finish()
    }
}

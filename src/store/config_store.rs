use super::StoreResult;
use crate::constants::ChannelKind;
use crate::models::{ChannelConfig, Template, TemplateKey, Tenant};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of truth for tenants, channel configuration and templates
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    async fn get_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>>;

    async fn get_channel_config(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
    ) -> StoreResult<Option<ChannelConfig>>;

    /// Latest effective version of the template
    async fn get_template(&self, key: &TemplateKey) -> StoreResult<Option<Template>>;
}

/// Configuration store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryConfigurationStore {
    tenants: RwLock<HashMap<String, Tenant>>,
    channel_configs: RwLock<HashMap<(String, ChannelKind), ChannelConfig>>,
    templates: RwLock<HashMap<TemplateKey, Template>>,
    channel_config_reads: AtomicUsize,
}

impl InMemoryConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_tenant(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    pub fn put_channel_config(&self, config: ChannelConfig) {
        self.channel_configs
            .write()
            .insert((config.tenant_id.clone(), config.channel), config);
    }

    pub fn remove_channel_config(&self, tenant_id: &str, channel: ChannelKind) {
        self.channel_configs
            .write()
            .remove(&(tenant_id.to_string(), channel));
    }

    /// Store a template. Replacing an existing one yields the next version.
    pub fn put_template(&self, mut template: Template) -> u32 {
        let mut templates = self.templates.write();
        if let Some(existing) = templates.get(&template.key) {
            template.version = existing.version + 1;
        }
        let version = template.version;
        templates.insert(template.key.clone(), template);
        version
    }

    /// Number of channel configuration reads served, for cache assertions
    pub fn channel_config_reads(&self) -> usize {
        self.channel_config_reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    async fn get_tenant(&self, tenant_id: &str) -> StoreResult<Option<Tenant>> {
        Ok(self.tenants.read().get(tenant_id).cloned())
    }

    async fn get_channel_config(
        &self,
        tenant_id: &str,
        channel: ChannelKind,
    ) -> StoreResult<Option<ChannelConfig>> {
        self.channel_config_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .channel_configs
            .read()
            .get(&(tenant_id.to_string(), channel))
            .cloned())
    }

    async fn get_template(&self, key: &TemplateKey) -> StoreResult<Option<Template>> {
        Ok(self.templates.read().get(key).cloned())
    }
}

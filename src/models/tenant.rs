use crate::constants::ChannelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// A customer organization. Its id scopes every configuration, template and task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub status: TenantStatus,
    /// Channels the tenant has configured; requests on other channels fail with ConfigNotFound
    pub channels: BTreeSet<ChannelKind>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TenantStatus::Active,
            channels: BTreeSet::new(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.channels.insert(channel);
        self
    }

    pub fn suspended(mut self) -> Self {
        self.status = TenantStatus::Suspended;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn has_channel(&self, channel: ChannelKind) -> bool {
        self.channels.contains(&channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_builder() {
        let tenant = Tenant::new("acme", "Acme Corp")
            .with_channel(ChannelKind::Email)
            .with_channel(ChannelKind::Sms);

        assert!(tenant.is_active());
        assert!(tenant.has_channel(ChannelKind::Email));
        assert!(!tenant.has_channel(ChannelKind::Push));
        assert!(!tenant.suspended().is_active());
    }
}

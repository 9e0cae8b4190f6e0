use crate::constants::ChannelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request as received at the intake boundary, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNotificationRequest {
    pub request_id: Option<String>,
    pub tenant_id: Option<String>,
    pub recipients: Vec<String>,
    pub channels: Vec<String>,
    pub template_name: Option<String>,
    pub language: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl RawNotificationRequest {
    pub fn new(tenant_id: impl Into<String>, template_name: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            template_name: Some(template_name.into()),
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipients.push(recipient.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }
}

/// A validated request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub request_id: String,
    pub tenant_id: String,
    pub recipients: Vec<String>,
    /// Deduplicated, in first-seen order
    pub channels: Vec<ChannelKind>,
    pub template_name: String,
    pub language: String,
    pub variables: BTreeMap<String, String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

impl NotificationRequest {
    /// Future-dated requests start in PENDING_SCHEDULE
    pub fn is_deferred(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time.is_some_and(|at| at > now)
    }
}

//! Dead-letter domain types.
//!
//! A task lands here once it can never be delivered: retries exhausted,
//! permanent provider failure, or a pre-dispatch failure (missing channel
//! configuration, suspended tenant, unrenderable template, no provider).

use super::delivery_attempt::DeliveryAttempt;
use super::delivery_task::{DeliveryTask, IdempotencyKey};
use crate::constants::ChannelKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a task was dead-lettered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Attempt ceiling hit on transient failures
    RetriesExhausted,

    /// Provider rejected the message permanently
    PermanentFailure,

    /// Tenant has no configuration for the channel
    ConfigNotFound,

    /// Tenant suspended after the request was accepted
    TenantSuspended,

    /// Template missing or a required variable absent
    TemplateRender,

    /// No provider registered for the channel
    ProviderMissing,
}

impl DeadLetterReason {
    /// Pre-dispatch reasons never consumed an attempt
    #[must_use]
    pub const fn is_pre_dispatch(self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound
                | Self::TenantSuspended
                | Self::TemplateRender
                | Self::ProviderMissing
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RetriesExhausted => "retries_exhausted",
            Self::PermanentFailure => "permanent_failure",
            Self::ConfigNotFound => "config_not_found",
            Self::TenantSuspended => "tenant_suspended",
            Self::TemplateRender => "template_render",
            Self::ProviderMissing => "provider_missing",
        }
    }
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure record with the full attempt history.
///
/// Keyed by `task_id`: sinks keep the first record written for a task, so a
/// re-applied resolution never produces a second record or replaces the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub task_id: Uuid,
    pub request_id: String,
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub idempotency_key: IdempotencyKey,
    pub recipients: Vec<String>,
    pub reason: DeadLetterReason,
    pub detail: String,
    pub attempts: Vec<DeliveryAttempt>,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn from_task(
        task: &DeliveryTask,
        reason: DeadLetterReason,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task.task_id,
            request_id: task.request_id.clone(),
            tenant_id: task.tenant_id.clone(),
            channel: task.channel,
            idempotency_key: task.idempotency_key.clone(),
            recipients: task.recipients.clone(),
            reason,
            detail: detail.into(),
            attempts: task.attempt_history.clone(),
            dead_lettered_at: Utc::now(),
        }
    }
}

//! # Delivery Task Model
//!
//! The unit of work for one (request, channel) pair.
//!
//! ## Overview
//!
//! The router creates exactly one `DeliveryTask` per channel of an accepted
//! request. The task carries the full recipient list, the template reference
//! and the variables it was created with, and from the first successful
//! render onwards the pinned [`RenderedContent`] so every retry sends the
//! same bytes.
//!
//! ## Identity
//!
//! `task_id` is a random UUID. The [`IdempotencyKey`] is derived from
//! (tenant, request, channel) with SHA-256 and is unique among in-flight
//! tasks; the task repository enforces that with an atomic insert-if-absent.
//!
//! ## Progress
//!
//! `delivered_recipients` records every recipient a provider has accepted.
//! Retries only address the remaining recipients, so a partial success is
//! never re-sent.
//!
//! ## Pending resolutions
//!
//! When a task's next transition cannot be made durable (ledger or
//! dead-letter store down), the decided outcome is parked in
//! `pending_resolution` and the task is re-queued. The next claim applies
//! the parked resolution without calling the provider again.

use super::dead_letter::DeadLetterReason;
use super::delivery_attempt::DeliveryAttempt;
use super::notification_request::NotificationRequest;
use super::template::RenderedContent;
use crate::constants::{system, ChannelKind};
use crate::state_machine::DeliveryStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Deterministic key over (tenant, request, channel), hex-encoded SHA-256
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(tenant_id: &str, request_id: &str, channel: ChannelKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update(system::IDEMPOTENCY_KEY_SEPARATOR.to_string().as_bytes());
        hasher.update(request_id.as_bytes());
        hasher.update(system::IDEMPOTENCY_KEY_SEPARATOR.to_string().as_bytes());
        hasher.update(channel.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome decided for a task but not yet durably recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PendingResolution {
    MarkSent,
    ScheduleRetry { delay_ms: u64, error: String },
    DeadLetter { reason: DeadLetterReason, detail: String },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTask {
    pub task_id: Uuid,
    pub idempotency_key: IdempotencyKey,
    pub request_id: String,
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub recipients: Vec<String>,
    pub template_name: String,
    pub language: String,
    pub variables: BTreeMap<String, String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    /// Provider dispatches made so far; deferrals do not count
    pub attempts: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub attempt_history: Vec<DeliveryAttempt>,
    pub rendered: Option<RenderedContent>,
    pub delivered_recipients: BTreeSet<String>,
    pub pending_resolution: Option<PendingResolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryTask {
    /// Build the task for one channel of an accepted request
    pub fn from_request(
        request: &NotificationRequest,
        channel: ChannelKind,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if request.is_deferred(now) {
            DeliveryStatus::PendingSchedule
        } else {
            DeliveryStatus::Pending
        };

        Self {
            task_id: Uuid::new_v4(),
            idempotency_key: IdempotencyKey::derive(
                &request.tenant_id,
                &request.request_id,
                channel,
            ),
            request_id: request.request_id.clone(),
            tenant_id: request.tenant_id.clone(),
            channel,
            recipients: request.recipients.clone(),
            template_name: request.template_name.clone(),
            language: request.language.clone(),
            variables: request.variables.clone(),
            scheduled_time: request.scheduled_time,
            status,
            attempts: 0,
            next_attempt_at: request
                .scheduled_time
                .filter(|_| status == DeliveryStatus::PendingSchedule),
            last_error: None,
            attempt_history: Vec::new(),
            rendered: None,
            delivered_recipients: BTreeSet::new(),
            pending_resolution: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recipients the provider has not yet accepted, in request order
    pub fn pending_recipients(&self) -> Vec<String> {
        self.recipients
            .iter()
            .filter(|recipient| !self.delivered_recipients.contains(*recipient))
            .cloned()
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append an attempt and fold its accepted recipients into progress
    pub fn record_attempt(&mut self, attempt: DeliveryAttempt) {
        for result in &attempt.results {
            if result.outcome.kind == super::OutcomeKind::Delivered {
                self.delivered_recipients.insert(result.recipient.clone());
            }
        }
        self.attempts = attempt.attempt_number;
        self.updated_at = attempt.finished_at;
        self.attempt_history.push(attempt);
    }
}

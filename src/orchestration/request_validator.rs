//! # Request Validator
//!
//! Synchronous intake checks. A request that fails here is rejected with a
//! [`ValidationError`] and never produces a task.

use super::tenant_config_resolver::TenantConfigResolver;
use crate::constants::ChannelKind;
use crate::error::{Result, ValidationError, ValidationErrorKind};
use crate::models::{NotificationRequest, RawNotificationRequest};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct RequestValidator {
    resolver: Arc<TenantConfigResolver>,
    default_language: String,
}

impl RequestValidator {
    pub fn new(resolver: Arc<TenantConfigResolver>, default_language: impl Into<String>) -> Self {
        Self {
            resolver,
            default_language: default_language.into(),
        }
    }

    /// Validate a raw request and confirm its tenant exists
    pub async fn validate(
        &self,
        raw: RawNotificationRequest,
        now: DateTime<Utc>,
    ) -> Result<NotificationRequest> {
        let request = validate_shape(raw, &self.default_language, now)?;

        if !self.resolver.tenant_exists(&request.tenant_id).await? {
            return Err(ValidationError::new(
                ValidationErrorKind::UnknownTenant,
                format!("tenant {} does not exist", request.tenant_id),
            )
            .into());
        }

        debug!(
            tenant_id = %request.tenant_id,
            request_id = %request.request_id,
            channels = request.channels.len(),
            recipients = request.recipients.len(),
            "Request validated"
        );
        Ok(request)
    }
}

/// Field-level checks that need no collaborators.
///
/// Channels and recipients are trimmed and deduplicated in first-seen order.
/// A missing request id is replaced by a generated one.
pub fn validate_shape(
    raw: RawNotificationRequest,
    default_language: &str,
    now: DateTime<Utc>,
) -> std::result::Result<NotificationRequest, ValidationError> {
    let tenant_id = required(raw.tenant_id, "tenantId")?;
    let template_name = required(raw.template_name, "templateName")?;

    if raw.channels.is_empty() {
        return Err(ValidationError::missing_field("channels"));
    }
    let mut channels: Vec<ChannelKind> = Vec::with_capacity(raw.channels.len());
    for name in &raw.channels {
        let channel = name.parse::<ChannelKind>().map_err(|_| {
            ValidationError::new(
                ValidationErrorKind::UnknownChannel,
                format!("unknown channel {name:?}"),
            )
        })?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    let mut recipients: Vec<String> = Vec::with_capacity(raw.recipients.len());
    for recipient in raw.recipients.iter().map(|r| r.trim()).filter(|r| !r.is_empty()) {
        if !recipients.iter().any(|existing| existing == recipient) {
            recipients.push(recipient.to_string());
        }
    }
    if recipients.is_empty() {
        return Err(ValidationError::new(
            ValidationErrorKind::EmptyRecipients,
            "at least one recipient is required",
        ));
    }

    if let Some(scheduled_time) = raw.scheduled_time {
        if scheduled_time < now {
            return Err(ValidationError::new(
                ValidationErrorKind::PastSchedule,
                format!("scheduledTime {} is in the past", scheduled_time.to_rfc3339()),
            ));
        }
    }

    let request_id = optional(raw.request_id).unwrap_or_else(|| Uuid::new_v4().to_string());
    let language = optional(raw.language).unwrap_or_else(|| default_language.to_string());

    Ok(NotificationRequest {
        request_id,
        tenant_id,
        recipients,
        channels,
        template_name,
        language,
        variables: raw.variables,
        scheduled_time: raw.scheduled_time,
        received_at: now,
    })
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> std::result::Result<String, ValidationError> {
    optional(value).ok_or_else(|| ValidationError::missing_field(field))
}

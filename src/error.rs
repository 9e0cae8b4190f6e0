//! Error types for the notification core.
//!

use crate::constants::ChannelKind;
use crate::state_machine::StateMachineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Kinds of synchronous intake rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    MissingField,
    InvalidField,
    UnknownChannel,
    UnknownTenant,
    EmptyRecipients,
    PastSchedule,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingField => "MissingField",
            Self::InvalidField => "InvalidField",
            Self::UnknownChannel => "UnknownChannel",
            Self::UnknownTenant => "UnknownTenant",
            Self::EmptyRecipients => "EmptyRecipients",
            Self::PastSchedule => "PastSchedule",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client input rejected at intake. No task is ever created for these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ValidationErrorKind::MissingField,
            format!("{field} is required"),
        )
    }

    pub fn invalid_field(field: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ValidationErrorKind::InvalidField,
            format!("{field} is invalid: {reason}"),
        )
    }
}

/// Rendering failures. All of them fail the affected channel before any provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateRenderError {
    #[error("template {template} is missing required variables: {}", missing.join(", "))]
    MissingVariable {
        template: String,
        missing: Vec<String>,
    },

    #[error("unknown template {name} for tenant {tenant_id} on {channel} ({language})")]
    UnknownTemplate {
        tenant_id: String,
        channel: ChannelKind,
        name: String,
        language: String,
    },

    #[error("template {template} could not be rendered: {reason}")]
    Malformed { template: String, reason: String },
}

impl TemplateRenderError {
    /// Stable reason code surfaced through the status ledger
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingVariable { .. } => "TemplateRenderError(MissingVariable)",
            Self::UnknownTemplate { .. } => "TemplateRenderError(UnknownTemplate)",
            Self::Malformed { .. } => "TemplateRenderError(Malformed)",
        }
    }
}

/// Failures raised by the storage collaborators (configuration store,
/// task repository, ledger, dead-letter sink).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NotificationError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No channel configuration for tenant {tenant_id} on {channel}")]
    ConfigNotFound {
        tenant_id: String,
        channel: ChannelKind,
    },

    #[error("Tenant {tenant_id} is suspended")]
    TenantSuspended { tenant_id: String },

    #[error("Template render error: {0}")]
    TemplateRender(#[from] TemplateRenderError),

    #[error("Transient delivery error: {0}")]
    TransientDelivery(String),

    #[error("Permanent delivery error: {0}")]
    PermanentDelivery(String),

    #[error("Rate limit exceeded for tenant {tenant_id} on {channel}, retry in {retry_after:?}")]
    RateLimitExceeded {
        tenant_id: String,
        channel: ChannelKind,
        retry_after: Duration,
    },

    #[error("Ledger write failure: {0}")]
    LedgerWriteFailure(String),

    #[error("Dead letter write failure: {0}")]
    DeadLetterWriteFailure(String),

    #[error("State machine error: {0}")]
    StateMachine(#[from] StateMachineError),

    #[error("No provider registered for channel {0}")]
    ProviderNotRegistered(ChannelKind),

    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    #[error("Request {0} not found")]
    RequestNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Engine state error: {0}")]
    EngineState(String),
}

impl NotificationError {
    /// Durable-write failures keep the task's resolution pending
    pub fn is_durable_write_failure(&self) -> bool {
        matches!(
            self,
            Self::LedgerWriteFailure(_) | Self::DeadLetterWriteFailure(_)
        )
    }

    /// Any failure of a durable collaborator, including a task repository
    /// write that lands after its ledger entry
    pub fn is_store_failure(&self) -> bool {
        self.is_durable_write_failure() || matches!(self, Self::Store(_))
    }
}

impl From<crate::config::ConfigurationError> for NotificationError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        NotificationError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_carries_kind() {
        let error = ValidationError::missing_field("tenantId");
        assert_eq!(error.kind, ValidationErrorKind::MissingField);
        assert_eq!(error.to_string(), "MissingField: tenantId is required");
    }

    #[test]
    fn test_missing_variable_lists_every_name() {
        let error = TemplateRenderError::MissingVariable {
            template: "welcome".to_string(),
            missing: vec!["firstName".to_string(), "plan".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "template welcome is missing required variables: firstName, plan"
        );
        assert_eq!(error.reason_code(), "TemplateRenderError(MissingVariable)");
    }

    #[test]
    fn test_durable_write_failures() {
        assert!(NotificationError::LedgerWriteFailure("down".into()).is_durable_write_failure());
        assert!(
            NotificationError::DeadLetterWriteFailure("down".into()).is_durable_write_failure()
        );
        assert!(!NotificationError::TransientDelivery("503".into()).is_durable_write_failure());

        let outage = NotificationError::Store(StoreError::Unavailable("db down".into()));
        assert!(!outage.is_durable_write_failure());
        assert!(outage.is_store_failure());
        assert!(NotificationError::LedgerWriteFailure("down".into()).is_store_failure());
        assert!(!NotificationError::TaskNotFound(Uuid::nil()).is_store_failure());
    }
}

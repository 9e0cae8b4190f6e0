use serde::{Deserialize, Serialize};

/// Events that drive delivery task transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeliveryEvent {
    /// Scheduled time reached
    Promote,
    /// Retry time reached and the task was claimed again
    RetryDue,
    /// Every recipient accepted by the provider
    Deliver,
    /// Transient failure with attempts remaining; carries the backoff in ms
    ScheduleRetry(u64),
    /// Dead-lettered with a reason
    Fail(String),
    /// Cancelled by a client or suppressed after an in-flight attempt
    Cancel,
}

impl DeliveryEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::RetryDue => "retry_due",
            Self::Deliver => "deliver",
            Self::ScheduleRetry(_) => "schedule_retry",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn backoff_ms(&self) -> Option<u64> {
        match self {
            Self::ScheduleRetry(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deliver | Self::Fail(_) | Self::Cancel)
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

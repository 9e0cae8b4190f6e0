use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single delivery task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// Future-dated task waiting for its scheduled time
    PendingSchedule,
    /// Eligible for dispatch
    Pending,
    /// Transient failure recorded, next attempt has a computed time
    RetryScheduled,
    /// Provider accepted the message for every recipient
    Sent,
    /// Dead-lettered
    Failed,
    /// Cancelled before dispatch, or suppressed after an in-flight attempt
    Cancelled,
}

impl DeliveryStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Cancelled)
    }

    /// Check if a worker may dispatch the task once claimed
    pub fn is_dispatchable(&self) -> bool {
        matches!(
            self,
            Self::PendingSchedule | Self::Pending | Self::RetryScheduled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingSchedule => "PENDING_SCHEDULE",
            Self::Pending => "PENDING",
            Self::RetryScheduled => "RETRY_SCHEDULED",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_SCHEDULE" => Ok(Self::PendingSchedule),
            "PENDING" => Ok(Self::Pending),
            "RETRY_SCHEDULED" => Ok(Self::RetryScheduled),
            "SENT" => Ok(Self::Sent),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid delivery status: {s}")),
        }
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Pending
    }
}

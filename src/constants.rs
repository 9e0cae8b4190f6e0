//! # System Constants
//!
//! Channel kinds, status groupings and the fixed names shared by the intake
//! boundary and the per-channel queues.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::state_machine::DeliveryStatus;

/// Notification medium. Each kind has exactly one provider and one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelKind {
    Push,
    Email,
    Sms,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Push, ChannelKind::Email, ChannelKind::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "PUSH",
            Self::Email => "EMAIL",
            Self::Sms => "SMS",
        }
    }

    /// Name of the logical delivery queue for this channel
    pub fn queue_name(&self) -> String {
        format!("notify.{}", self.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PUSH" => Ok(Self::Push),
            "EMAIL" => Ok(Self::Email),
            "SMS" => Ok(Self::Sms),
            _ => Err(format!("Unknown channel kind: {s}")),
        }
    }
}

/// System-wide constants
pub mod system {
    /// Language used when a request names none
    pub const DEFAULT_LANGUAGE: &str = "en";

    /// Separator between idempotency key components before hashing
    pub const IDEMPOTENCY_KEY_SEPARATOR: char = '\u{1f}';

    /// Component name used in structured log records
    pub const COMPONENT_NAME: &str = "notification_core";
}

/// Intake routes served by the gateway layer
pub mod api_paths {
    pub const SEND: &str = "/api/v1/notifications/send";
    pub const SCHEDULE: &str = "/api/v1/notifications/schedule";
    pub const STATUS: &str = "/api/v1/notifications/{request_id}/status";
}

/// Status groupings for routing and query logic
pub mod status_groups {
    use super::DeliveryStatus;

    /// Statuses that block creation of a second task for the same idempotency key
    pub const IN_FLIGHT_STATUSES: &[DeliveryStatus] = &[
        DeliveryStatus::PendingSchedule,
        DeliveryStatus::Pending,
        DeliveryStatus::RetryScheduled,
    ];

    /// Statuses after which no further transition is allowed
    pub const TERMINAL_STATUSES: &[DeliveryStatus] = &[
        DeliveryStatus::Sent,
        DeliveryStatus::Failed,
        DeliveryStatus::Cancelled,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_parsing_is_case_insensitive() {
        assert_eq!("email".parse::<ChannelKind>().unwrap(), ChannelKind::Email);
        assert_eq!(" SMS ".parse::<ChannelKind>().unwrap(), ChannelKind::Sms);
        assert_eq!("Push".parse::<ChannelKind>().unwrap(), ChannelKind::Push);
        assert!("fax".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_queue_names() {
        assert_eq!(ChannelKind::Sms.queue_name(), "notify.sms");
        assert_eq!(ChannelKind::Email.queue_name(), "notify.email");
    }

    #[test]
    fn test_channel_kind_serde() {
        let json = serde_json::to_string(&ChannelKind::Email).unwrap();
        assert_eq!(json, "\"EMAIL\"");
    }

    #[test]
    fn test_status_groups_are_disjoint() {
        for status in status_groups::IN_FLIGHT_STATUSES {
            assert!(!status_groups::TERMINAL_STATUSES.contains(status));
        }
    }
}

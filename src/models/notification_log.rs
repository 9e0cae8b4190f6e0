use crate::constants::ChannelKind;
use crate::state_machine::DeliveryStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only ledger entry per status transition.
///
/// `from_status` is `None` for the creation entry. `sequence` is assigned by
/// the ledger store and orders entries across tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLog {
    pub sequence: u64,
    pub task_id: Uuid,
    pub request_id: String,
    pub tenant_id: String,
    pub channel: ChannelKind,
    pub from_status: Option<DeliveryStatus>,
    pub to_status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Chosen backoff for RETRY_SCHEDULED entries
    pub backoff_ms: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// Per-channel status as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub task_id: Uuid,
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&NotificationLog> for ChannelStatus {
    fn from(entry: &NotificationLog) -> Self {
        Self {
            task_id: entry.task_id,
            channel: entry.channel,
            status: entry.to_status,
            attempts: entry.attempts,
            last_error: entry.last_error.clone(),
            updated_at: entry.recorded_at,
        }
    }
}

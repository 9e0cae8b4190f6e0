//! # Status Ledger
//!
//! Append-only record of every delivery status transition, and the only
//! source for status queries.
//!
//! A transition is written here before the new status is stored on the
//! task, so anything a client can observe has a ledger entry behind it.
//! Appends are retried a configurable number of times; when they still
//! fail the caller gets [`NotificationError::LedgerWriteFailure`] and must
//! leave the task unchanged.

use crate::config::LedgerConfig;
use crate::constants::ChannelKind;
use crate::error::{NotificationError, Result};
use crate::models::{ChannelStatus, DeliveryTask, NotificationLog};
use crate::state_machine::DeliveryStatus;
use crate::store::LedgerStore;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

pub struct StatusLedger {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl StatusLedger {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Append the entry describing `task`'s current status.
    ///
    /// `from` is `None` for the creation entry.
    pub async fn record_transition(
        &self,
        task: &DeliveryTask,
        from: Option<DeliveryStatus>,
        backoff_ms: Option<u64>,
    ) -> Result<u64> {
        let entry = NotificationLog {
            sequence: 0,
            task_id: task.task_id,
            request_id: task.request_id.clone(),
            tenant_id: task.tenant_id.clone(),
            channel: task.channel,
            from_status: from,
            to_status: task.status,
            attempts: task.attempts,
            last_error: task.last_error.clone(),
            backoff_ms,
            recorded_at: Utc::now(),
        };

        let attempts = self.config.write_retry_attempts.max(1);
        let mut last_failure = String::new();
        for attempt in 1..=attempts {
            match self.store.append(entry.clone()).await {
                Ok(sequence) => return Ok(sequence),
                Err(e) => {
                    warn!(
                        task_id = %task.task_id,
                        attempt = attempt,
                        error = %e,
                        "Ledger append failed"
                    );
                    last_failure = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.write_retry_delay()).await;
                    }
                }
            }
        }

        error!(
            alert = true,
            task_id = %task.task_id,
            tenant_id = %task.tenant_id,
            request_id = %task.request_id,
            channel = %task.channel,
            to_status = %task.status,
            error = %last_failure,
            "Ledger write failed after retries; transition withheld"
        );
        Err(NotificationError::LedgerWriteFailure(last_failure))
    }

    /// Current status of every channel of a request.
    ///
    /// When a channel was re-sent after a terminal failure, the newest task
    /// for that channel is reported.
    pub async fn get_status(&self, request_id: &str) -> Result<Vec<ChannelStatus>> {
        let mut entries = self.store.entries_for_request(request_id).await?;
        entries.sort_by_key(|entry| entry.sequence);

        let mut latest: HashMap<Uuid, &NotificationLog> = HashMap::new();
        let mut current_task: BTreeMap<ChannelKind, Uuid> = BTreeMap::new();
        for entry in &entries {
            if entry.from_status.is_none() {
                current_task.insert(entry.channel, entry.task_id);
            }
            latest.insert(entry.task_id, entry);
        }

        Ok(current_task
            .values()
            .filter_map(|task_id| latest.get(task_id))
            .map(|entry| ChannelStatus::from(*entry))
            .collect())
    }

    pub async fn task_status(&self, task_id: Uuid) -> Result<Option<ChannelStatus>> {
        let entries = self.store.entries_for_task(task_id).await?;
        Ok(entries
            .iter()
            .max_by_key(|entry| entry.sequence)
            .map(ChannelStatus::from))
    }

    /// Every entry for a task, oldest first
    pub async fn history(&self, task_id: Uuid) -> Result<Vec<NotificationLog>> {
        let mut entries = self.store.entries_for_task(task_id).await?;
        entries.sort_by_key(|entry| entry.sequence);
        Ok(entries)
    }

    pub async fn tenant_history(&self, tenant_id: &str) -> Result<Vec<NotificationLog>> {
        let mut entries = self.store.entries_for_tenant(tenant_id).await?;
        entries.sort_by_key(|entry| entry.sequence);
        Ok(entries)
    }
}

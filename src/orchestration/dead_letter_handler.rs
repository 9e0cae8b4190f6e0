//! # Dead Letter Handler
//!
//! Final stop for tasks that can never be delivered. The record goes to the
//! sink first, with the task's full attempt history, and only then is the
//! task marked FAILED. A sink outage therefore leaves the task un-failed
//! and its resolution pending; nothing reaches FAILED without a record.

use crate::error::{NotificationError, Result};
use crate::models::{DeadLetterReason, DeadLetterRecord, DeliveryTask};
use crate::state_machine::{DeliveryEvent, DeliveryStateMachine, DeliveryStatus};
use crate::store::DeadLetterSink;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct DeadLetterHandler {
    sink: Arc<dyn DeadLetterSink>,
    state_machine: Arc<DeliveryStateMachine>,
}

impl DeadLetterHandler {
    pub fn new(sink: Arc<dyn DeadLetterSink>, state_machine: Arc<DeliveryStateMachine>) -> Self {
        Self {
            sink,
            state_machine,
        }
    }

    /// Record the task in the sink, then fail it with `detail` as last error
    #[instrument(skip(self, task, detail), fields(task_id = %task.task_id, reason = %reason))]
    pub async fn escalate(
        &self,
        task: &mut DeliveryTask,
        reason: DeadLetterReason,
        detail: &str,
    ) -> Result<DeliveryStatus> {
        let record = DeadLetterRecord::from_task(task, reason, detail);
        if let Err(e) = self.sink.record(&record).await {
            error!(
                alert = true,
                task_id = %task.task_id,
                tenant_id = %task.tenant_id,
                request_id = %task.request_id,
                channel = %task.channel,
                reason = %reason,
                error = %e,
                "Dead-letter write failed; task left unresolved"
            );
            return Err(NotificationError::DeadLetterWriteFailure(e.to_string()));
        }

        let status = self
            .state_machine
            .transition(task, DeliveryEvent::fail_with_error(detail))
            .await?;

        info!(
            task_id = %task.task_id,
            tenant_id = %task.tenant_id,
            channel = %task.channel,
            reason = %reason,
            attempts = task.attempts,
            "Task dead-lettered"
        );
        Ok(status)
    }

    pub async fn get(&self, task_id: uuid::Uuid) -> Result<Option<DeadLetterRecord>> {
        Ok(self.sink.get(task_id).await?)
    }

    pub async fn list(&self) -> Result<Vec<DeadLetterRecord>> {
        Ok(self.sink.list().await?)
    }
}

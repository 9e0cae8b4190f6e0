use super::{
    errors::{StateMachineError, StateMachineResult},
    events::DeliveryEvent,
    states::DeliveryStatus,
};
use crate::error::Result;
use crate::models::DeliveryTask;
use crate::orchestration::status_ledger::StatusLedger;
use crate::store::TaskRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Determine the target status for an event, or reject the transition
pub fn determine_target_state(
    current: DeliveryStatus,
    event: &DeliveryEvent,
) -> StateMachineResult<DeliveryStatus> {
    if current.is_terminal() {
        return Err(StateMachineError::AlreadyTerminal { status: current });
    }

    let target = match (current, event) {
        // Scheduled work becomes eligible
        (DeliveryStatus::PendingSchedule, DeliveryEvent::Promote) => DeliveryStatus::Pending,
        (DeliveryStatus::RetryScheduled, DeliveryEvent::RetryDue) => DeliveryStatus::Pending,

        // Dispatch outcomes
        (DeliveryStatus::Pending, DeliveryEvent::Deliver) => DeliveryStatus::Sent,
        (DeliveryStatus::Pending, DeliveryEvent::ScheduleRetry(_)) => {
            DeliveryStatus::RetryScheduled
        }
        (DeliveryStatus::Pending, DeliveryEvent::Fail(_)) => DeliveryStatus::Failed,

        // Cancellation
        (DeliveryStatus::PendingSchedule, DeliveryEvent::Cancel) => DeliveryStatus::Cancelled,
        (DeliveryStatus::Pending, DeliveryEvent::Cancel) => DeliveryStatus::Cancelled,

        (from, _) => {
            return Err(StateMachineError::InvalidTransition {
                from,
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}

/// Applies transitions to delivery tasks: ledger first, repository second
pub struct DeliveryStateMachine {
    ledger: Arc<StatusLedger>,
    repository: Arc<dyn TaskRepository>,
}

impl DeliveryStateMachine {
    pub fn new(ledger: Arc<StatusLedger>, repository: Arc<dyn TaskRepository>) -> Self {
        Self { ledger, repository }
    }

    /// Record the creation entry for a freshly routed task
    pub async fn record_creation(&self, task: &DeliveryTask) -> Result<()> {
        self.ledger.record_transition(task, None, None).await?;
        Ok(())
    }

    /// Attempt to transition the task.
    ///
    /// On error the caller's task is left untouched, so a failed ledger write
    /// never leaks a status the ledger does not know about.
    #[instrument(skip(self, task), fields(task_id = %task.task_id, event = event.event_type()))]
    pub async fn transition(
        &self,
        task: &mut DeliveryTask,
        event: DeliveryEvent,
    ) -> Result<DeliveryStatus> {
        let from = task.status;
        let target = determine_target_state(from, &event)?;

        let mut next = task.clone();
        next.status = target;
        next.updated_at = Utc::now();
        if let Some(message) = event.error_message() {
            next.last_error = Some(message.to_string());
        }
        if target != DeliveryStatus::RetryScheduled {
            next.next_attempt_at = None;
        }

        self.ledger
            .record_transition(&next, Some(from), event.backoff_ms())
            .await?;
        self.repository.put(next.clone()).await?;

        debug!(from = %from, to = %target, "Delivery task transitioned");
        *task = next;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use DeliveryEvent as E;
        use DeliveryStatus as S;

        let cases = [
            (S::PendingSchedule, E::Promote, S::Pending),
            (S::PendingSchedule, E::Cancel, S::Cancelled),
            (S::Pending, E::Deliver, S::Sent),
            (S::Pending, E::ScheduleRetry(1000), S::RetryScheduled),
            (S::Pending, E::Fail("boom".into()), S::Failed),
            (S::Pending, E::Cancel, S::Cancelled),
            (S::RetryScheduled, E::RetryDue, S::Pending),
        ];

        for (from, event, expected) in cases {
            assert_eq!(determine_target_state(from, &event).unwrap(), expected);
        }
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        for status in [
            DeliveryStatus::Sent,
            DeliveryStatus::Failed,
            DeliveryStatus::Cancelled,
        ] {
            let result = determine_target_state(status, &DeliveryEvent::Promote);
            assert_eq!(result, Err(StateMachineError::AlreadyTerminal { status }));
        }
    }

    #[test]
    fn test_retry_scheduled_cannot_be_cancelled_or_delivered() {
        use DeliveryEvent as E;
        use DeliveryStatus as S;

        assert!(determine_target_state(S::RetryScheduled, &E::Cancel).is_err());
        assert!(determine_target_state(S::RetryScheduled, &E::Deliver).is_err());
        assert!(determine_target_state(S::PendingSchedule, &E::Deliver).is_err());
    }
}

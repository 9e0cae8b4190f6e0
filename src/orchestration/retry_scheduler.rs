//! # Retry Scheduler
//!
//! Turns the classified outcome of an attempt into the task's next state and
//! makes that state durable.
//!
//! ## Decisions
//!
//! | Outcome              | Attempts left | Resolution                  |
//! |----------------------|---------------|-----------------------------|
//! | Delivered            | -             | SENT                        |
//! | TransientFailure     | yes           | RETRY_SCHEDULED, re-enqueue |
//! | TransientFailure     | no            | dead-letter (exhausted)     |
//! | PermanentFailure     | -             | dead-letter (permanent)     |
//!
//! A task whose cancellation arrived while it was claimed is cancelled
//! instead of being retried.
//!
//! ## Durability
//!
//! A resolution whose ledger, dead-letter or task repository write fails is
//! parked on the task and the task is handed back to its queue after the
//! defer delay. The next claim applies the parked resolution without calling
//! the provider. When the repository cannot even store the parked copy, the
//! scheduler holds it in memory until a worker takes it back.

use super::backoff_calculator::BackoffCalculator;
use super::dead_letter_handler::DeadLetterHandler;
use super::delivery_queue::DeliveryQueues;
use crate::error::Result;
use crate::models::{DeadLetterReason, DeliveryTask, OutcomeKind, PendingResolution};
use crate::state_machine::{DeliveryEvent, DeliveryStateMachine};
use crate::store::TaskRepository;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What happened to a task after the scheduler handled it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingDecision {
    Sent,
    RetryScheduled { delay: Duration },
    DeadLettered(DeadLetterReason),
    Cancelled,
    /// Handed back to the queue without consuming an attempt
    Deferred(Duration),
}

pub struct RetryScheduler {
    backoff: BackoffCalculator,
    state_machine: Arc<DeliveryStateMachine>,
    dead_letters: Arc<DeadLetterHandler>,
    repository: Arc<dyn TaskRepository>,
    queues: Arc<DeliveryQueues>,
    suppressed: Arc<DashSet<Uuid>>,
    defer_delay: Duration,
    parked: DashMap<Uuid, DeliveryTask>,
}

impl RetryScheduler {
    pub fn new(
        backoff: BackoffCalculator,
        state_machine: Arc<DeliveryStateMachine>,
        dead_letters: Arc<DeadLetterHandler>,
        repository: Arc<dyn TaskRepository>,
        queues: Arc<DeliveryQueues>,
        suppressed: Arc<DashSet<Uuid>>,
        defer_delay: Duration,
    ) -> Self {
        Self {
            backoff,
            state_machine,
            dead_letters,
            repository,
            queues,
            suppressed,
            defer_delay,
            parked: DashMap::new(),
        }
    }

    pub fn backoff(&self) -> &BackoffCalculator {
        &self.backoff
    }

    /// Decide the resolution for a task whose latest attempt is recorded
    pub fn decide(
        &self,
        task: &DeliveryTask,
        outcome: OutcomeKind,
        error: Option<String>,
    ) -> PendingResolution {
        let error = error.unwrap_or_else(|| "unknown provider error".to_string());
        match outcome {
            OutcomeKind::Delivered => PendingResolution::MarkSent,
            OutcomeKind::PermanentFailure => PendingResolution::DeadLetter {
                reason: DeadLetterReason::PermanentFailure,
                detail: error,
            },
            OutcomeKind::TransientFailure if self.suppressed.contains(&task.task_id) => {
                PendingResolution::Cancel
            }
            OutcomeKind::TransientFailure if self.backoff.should_retry(task.attempts) => {
                let backoff = self.backoff.calculate(task.attempts);
                PendingResolution::ScheduleRetry {
                    delay_ms: backoff.delay_ms,
                    error,
                }
            }
            OutcomeKind::TransientFailure => PendingResolution::DeadLetter {
                reason: DeadLetterReason::RetriesExhausted,
                detail: error,
            },
        }
    }

    /// Apply a resolution, parking it on the task if it cannot be made durable
    #[instrument(skip(self, task), fields(task_id = %task.task_id, channel = %task.channel))]
    pub async fn resolve(
        &self,
        task: &mut DeliveryTask,
        resolution: PendingResolution,
    ) -> Result<SchedulingDecision> {
        task.pending_resolution = None;
        match self.apply(task, resolution.clone()).await {
            Ok(decision) => {
                self.parked.remove(&task.task_id);
                Ok(decision)
            }
            Err(e) if e.is_store_failure() => {
                warn!(
                    task_id = %task.task_id,
                    error = %e,
                    defer_ms = self.defer_delay.as_millis() as u64,
                    "Resolution not durable; parking it on the task"
                );
                task.pending_resolution = Some(resolution);
                match self.repository.put(task.clone()).await {
                    Ok(()) => {
                        self.parked.remove(&task.task_id);
                    }
                    Err(store_error) => {
                        warn!(
                            task_id = %task.task_id,
                            error = %store_error,
                            "Could not persist pending resolution; holding it in memory"
                        );
                        self.parked.insert(task.task_id, task.clone());
                    }
                }
                self.queues
                    .queue(task.channel)
                    .requeue(task.task_id, self.defer_delay);
                Ok(SchedulingDecision::Deferred(self.defer_delay))
            }
            Err(e) => Err(e),
        }
    }

    /// Take back a task whose parked resolution never reached the repository
    pub fn take_parked(&self, task_id: Uuid) -> Option<DeliveryTask> {
        self.parked.remove(&task_id).map(|(_, task)| task)
    }

    async fn apply(
        &self,
        task: &mut DeliveryTask,
        resolution: PendingResolution,
    ) -> Result<SchedulingDecision> {
        let queue = self.queues.queue(task.channel);
        let decision = match resolution {
            PendingResolution::MarkSent => {
                self.state_machine
                    .transition(task, DeliveryEvent::Deliver)
                    .await?;
                info!(
                    task_id = %task.task_id,
                    channel = %task.channel,
                    attempts = task.attempts,
                    "Task delivered"
                );
                SchedulingDecision::Sent
            }
            PendingResolution::ScheduleRetry { delay_ms, error } => {
                let delay = Duration::from_millis(delay_ms);
                task.last_error = Some(error);
                task.next_attempt_at = Some(
                    Utc::now()
                        + chrono::Duration::milliseconds(
                            i64::try_from(delay_ms).unwrap_or(i64::MAX),
                        ),
                );
                self.state_machine
                    .transition(task, DeliveryEvent::ScheduleRetry(delay_ms))
                    .await?;
                queue.requeue(task.task_id, delay);
                debug!(
                    task_id = %task.task_id,
                    attempts = task.attempts,
                    delay_ms = delay_ms,
                    "Retry scheduled"
                );
                return Ok(SchedulingDecision::RetryScheduled { delay });
            }
            PendingResolution::DeadLetter { reason, detail } => {
                self.dead_letters.escalate(task, reason, &detail).await?;
                SchedulingDecision::DeadLettered(reason)
            }
            PendingResolution::Cancel => {
                self.state_machine
                    .transition(task, DeliveryEvent::Cancel)
                    .await?;
                info!(task_id = %task.task_id, channel = %task.channel, "Task cancelled");
                SchedulingDecision::Cancelled
            }
        };

        self.suppressed.remove(&task.task_id);
        queue.complete(task.task_id);
        Ok(decision)
    }
}

//! # Notification Router
//!
//! Fans a validated request out into one delivery task per channel.
//!
//! For each channel the idempotency key is bound with an atomic
//! insert-if-absent. A key still held by an in-flight or SENT task makes the
//! channel a duplicate and the existing task is reported back. A key held by
//! a FAILED or CANCELLED task is rebound to a fresh task with
//! compare-and-swap. The creation entry is written to the ledger before the
//! task is queued; if that write fails the task is removed again. Channels
//! are routed independently and one failing channel never blocks another.

use super::delivery_queue::DeliveryQueues;
use crate::constants::ChannelKind;
use crate::error::Result;
use crate::models::{DeliveryTask, NotificationRequest};
use crate::state_machine::{DeliveryStateMachine, DeliveryStatus};
use crate::store::TaskRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum RouteOutcome {
    Created,
    /// The idempotency key is held by an existing task
    Duplicate,
    Failed(String),
}

/// Routing result for one channel of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedTask {
    pub channel: ChannelKind,
    pub task_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub outcome: RouteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingReport {
    pub request_id: String,
    pub tasks: Vec<RoutedTask>,
}

impl RoutingReport {
    pub fn created(&self) -> usize {
        self.count(|outcome| matches!(outcome, RouteOutcome::Created))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|outcome| matches!(outcome, RouteOutcome::Duplicate))
    }

    pub fn failures(&self) -> usize {
        self.count(|outcome| matches!(outcome, RouteOutcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&RouteOutcome) -> bool) -> usize {
        self.tasks.iter().filter(|task| predicate(&task.outcome)).count()
    }
}

pub struct NotificationRouter {
    repository: Arc<dyn TaskRepository>,
    state_machine: Arc<DeliveryStateMachine>,
    queues: Arc<DeliveryQueues>,
}

impl NotificationRouter {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        state_machine: Arc<DeliveryStateMachine>,
        queues: Arc<DeliveryQueues>,
    ) -> Self {
        Self {
            repository,
            state_machine,
            queues,
        }
    }

    #[instrument(
        skip(self, request),
        fields(request_id = %request.request_id, tenant_id = %request.tenant_id)
    )]
    pub async fn route(&self, request: &NotificationRequest) -> RoutingReport {
        let now = Utc::now();
        let mut tasks = Vec::with_capacity(request.channels.len());

        for &channel in &request.channels {
            let routed = match self.route_channel(request, channel, now).await {
                Ok(routed) => routed,
                Err(e) => {
                    warn!(
                        request_id = %request.request_id,
                        channel = %channel,
                        error = %e,
                        "Failed to route channel"
                    );
                    RoutedTask {
                        channel,
                        task_id: None,
                        status: None,
                        outcome: RouteOutcome::Failed(e.to_string()),
                    }
                }
            };
            tasks.push(routed);
        }

        let report = RoutingReport {
            request_id: request.request_id.clone(),
            tasks,
        };
        info!(
            request_id = %request.request_id,
            created = report.created(),
            duplicates = report.duplicates(),
            failures = report.failures(),
            "Request routed"
        );
        report
    }

    async fn route_channel(
        &self,
        request: &NotificationRequest,
        channel: ChannelKind,
        now: DateTime<Utc>,
    ) -> Result<RoutedTask> {
        let task = DeliveryTask::from_request(request, channel, now);

        match self.repository.insert_if_absent(task.clone()).await? {
            None => {}
            Some(existing) if is_replaceable(existing.status) => {
                let swapped = self
                    .repository
                    .compare_and_swap(&task.idempotency_key, existing.task_id, task.clone())
                    .await?;
                if !swapped {
                    // Another submission rebound the key first
                    return match self.repository.find_by_key(&task.idempotency_key).await? {
                        Some(holder) => Ok(duplicate(holder)),
                        None => Ok(duplicate(existing)),
                    };
                }
                debug!(
                    previous_task_id = %existing.task_id,
                    task_id = %task.task_id,
                    "Replacing terminally failed task"
                );
            }
            Some(existing) => return Ok(duplicate(existing)),
        }

        if let Err(e) = self.state_machine.record_creation(&task).await {
            if let Err(remove_error) = self.repository.remove(task.task_id).await {
                warn!(
                    task_id = %task.task_id,
                    error = %remove_error,
                    "Could not roll back unrecorded task"
                );
            }
            return Err(e);
        }

        self.queues
            .queue(channel)
            .enqueue(task.task_id, ready_at(&task, now));
        debug!(
            task_id = %task.task_id,
            channel = %channel,
            status = %task.status,
            "Delivery task created"
        );

        Ok(RoutedTask {
            channel,
            task_id: Some(task.task_id),
            status: Some(task.status),
            outcome: RouteOutcome::Created,
        })
    }
}

/// A new task may take over a key whose holder ended without delivering
fn is_replaceable(status: DeliveryStatus) -> bool {
    matches!(status, DeliveryStatus::Failed | DeliveryStatus::Cancelled)
}

fn duplicate(existing: DeliveryTask) -> RoutedTask {
    RoutedTask {
        channel: existing.channel,
        task_id: Some(existing.task_id),
        status: Some(existing.status),
        outcome: RouteOutcome::Duplicate,
    }
}

/// Queue time for a task: now, or its scheduled time when deferred
pub(crate) fn ready_at(task: &DeliveryTask, now: DateTime<Utc>) -> Instant {
    let delay = task
        .next_attempt_at
        .filter(|_| task.status == DeliveryStatus::PendingSchedule)
        .and_then(|at| (at - now).to_std().ok())
        .unwrap_or_default();
    Instant::now() + delay
}

//! # Channel Dispatch Worker
//!
//! Worker loops that pull claimed tasks off one channel's queue and drive a
//! single delivery attempt each.
//!
//! ## Processing a claim
//!
//! 1. Load the task, preferring a copy the scheduler is holding because the
//!    repository could not store it. Terminal tasks are released untouched.
//! 2. Apply a parked resolution if the task has one, without calling the
//!    provider.
//! 3. Promote a scheduled task or mark a retry as due.
//! 4. Resolve the channel configuration and take a rate-limit permit.
//! 5. Render the content, or reuse the content pinned by an earlier attempt.
//! 6. Call the provider once per recipient still owed, each call under the
//!    configured timeout.
//! 7. Record the attempt and hand the classified outcome to the scheduler.
//!
//! Failures before the provider call are classified by the
//! [`ErrorClassifier`]: outages and rate limits defer the task without
//! consuming an attempt; configuration and template problems dead-letter it.
//! A worker never retries inline, and a task store outage hands the task
//! back to its queue instead of dropping the claim.

use super::delivery_queue::{ClaimedTask, DeliveryQueue};
use super::error_classifier::{ErrorClassifier, ErrorDisposition};
use super::rate_limiter::RateLimiter;
use super::retry_scheduler::{RetryScheduler, SchedulingDecision};
use super::template_renderer::TemplateRenderer;
use super::tenant_config_resolver::TenantConfigResolver;
use crate::constants::ChannelKind;
use crate::error::{NotificationError, Result};
use crate::logging::log_error;
use crate::models::{
    DeliveryAttempt, DeliveryOutcome, DeliveryTask, OutcomeKind, PendingResolution,
    RecipientResult, RenderedContent,
};
use crate::registry::ProviderRegistry;
use crate::state_machine::{DeliveryEvent, DeliveryStateMachine, DeliveryStatus};
use crate::store::TaskRepository;
use chrono::Utc;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Collaborators shared by every worker of every channel
pub struct DispatchContext {
    pub repository: Arc<dyn TaskRepository>,
    pub resolver: Arc<TenantConfigResolver>,
    pub renderer: Arc<TemplateRenderer>,
    pub providers: Arc<ProviderRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub classifier: Arc<dyn ErrorClassifier>,
    pub scheduler: Arc<RetryScheduler>,
    pub state_machine: Arc<DeliveryStateMachine>,
    pub suppressed: Arc<DashSet<Uuid>>,
    pub provider_timeout: Duration,
    pub defer_delay: Duration,
}

pub struct DispatchWorker {
    worker_id: String,
    queue: Arc<DeliveryQueue>,
    context: Arc<DispatchContext>,
}

impl DispatchWorker {
    pub fn new(
        worker_id: String,
        queue: Arc<DeliveryQueue>,
        context: Arc<DispatchContext>,
    ) -> Self {
        Self {
            worker_id,
            queue,
            context,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.queue.channel()
    }

    /// Claim and process tasks until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.worker_id, channel = %self.channel(), "Dispatch worker started");
        while let Some(claimed) = self.queue.claim(&mut shutdown).await {
            self.process(claimed).await;
        }
        info!(worker_id = %self.worker_id, channel = %self.channel(), "Dispatch worker stopped");
    }

    /// Handle one claim. Returns what became of the task, if anything.
    #[instrument(
        skip(self, claimed),
        fields(worker_id = %self.worker_id, task_id = %claimed.task_id, channel = %claimed.channel)
    )]
    pub async fn process(&self, claimed: ClaimedTask) -> Option<SchedulingDecision> {
        let loaded = match self.context.scheduler.take_parked(claimed.task_id) {
            Some(task) => Ok(Some(task)),
            None => self.context.repository.get(claimed.task_id).await,
        };
        let task = match loaded {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task_id = %claimed.task_id, "Claimed task no longer exists");
                self.queue.complete(claimed.task_id);
                return None;
            }
            Err(e) => {
                warn!(task_id = %claimed.task_id, error = %e, "Could not load claimed task");
                self.queue.requeue(claimed.task_id, self.context.defer_delay);
                return Some(SchedulingDecision::Deferred(self.context.defer_delay));
            }
        };

        if task.is_terminal() {
            debug!(task_id = %task.task_id, status = %task.status, "Releasing terminal task");
            self.context.suppressed.remove(&task.task_id);
            self.queue.complete(task.task_id);
            return None;
        }

        let task_id = task.task_id;
        match self.drive(task).await {
            Ok(decision) => Some(decision),
            Err(e) if e.is_store_failure() => {
                warn!(
                    task_id = %task_id,
                    error = %e,
                    defer_ms = self.context.defer_delay.as_millis() as u64,
                    "Task store unavailable; handing the task back"
                );
                self.queue.requeue(task_id, self.context.defer_delay);
                Some(SchedulingDecision::Deferred(self.context.defer_delay))
            }
            Err(e) => {
                log_error(
                    "dispatch_worker",
                    "process",
                    &e.to_string(),
                    Some(&format!("task_id={task_id}")),
                );
                self.queue.complete(task_id);
                None
            }
        }
    }

    async fn drive(&self, mut task: DeliveryTask) -> Result<SchedulingDecision> {
        let scheduler = &self.context.scheduler;

        if let Some(resolution) = task.pending_resolution.clone() {
            debug!(task_id = %task.task_id, "Re-applying pending resolution");
            return scheduler.resolve(&mut task, resolution).await;
        }

        if self.context.suppressed.contains(&task.task_id) {
            if task.status == DeliveryStatus::RetryScheduled {
                if let Err(e) = self.make_due(&mut task).await {
                    return self.handle_pre_dispatch_error(&mut task, e).await;
                }
            }
            return scheduler.resolve(&mut task, PendingResolution::Cancel).await;
        }

        if let Err(e) = self.make_due(&mut task).await {
            return self.handle_pre_dispatch_error(&mut task, e).await;
        }

        match self.dispatch(&mut task).await {
            Ok(attempt) => {
                let outcome = attempt.outcome;
                let error = attempt.first_error();
                task.record_attempt(attempt);
                let resolution = scheduler.decide(&task, outcome, error);
                scheduler.resolve(&mut task, resolution).await
            }
            Err(e) => self.handle_pre_dispatch_error(&mut task, e).await,
        }
    }

    /// Move a scheduled or retry-waiting task to PENDING
    async fn make_due(&self, task: &mut DeliveryTask) -> Result<()> {
        let event = match task.status {
            DeliveryStatus::PendingSchedule => DeliveryEvent::Promote,
            DeliveryStatus::RetryScheduled => DeliveryEvent::RetryDue,
            _ => return Ok(()),
        };
        self.context.state_machine.transition(task, event).await?;
        Ok(())
    }

    /// Everything up to and including the provider calls
    async fn dispatch(&self, task: &mut DeliveryTask) -> Result<DeliveryAttempt> {
        let config = self
            .context
            .resolver
            .resolve(&task.tenant_id, task.channel)
            .await?;

        if let Some(limit) = &config.rate_limit {
            if let Err(retry_after) = self
                .context
                .rate_limiter
                .try_acquire(&task.tenant_id, task.channel, limit)
            {
                return Err(NotificationError::RateLimitExceeded {
                    tenant_id: task.tenant_id.clone(),
                    channel: task.channel,
                    retry_after,
                });
            }
        }

        let content = self.content_for(task).await?;
        let provider = self
            .context
            .providers
            .get(task.channel)
            .ok_or(NotificationError::ProviderNotRegistered(task.channel))?;

        let started_at = Utc::now();
        let mut results = Vec::new();
        for recipient in task.pending_recipients() {
            let outcome = match tokio::time::timeout(
                self.context.provider_timeout,
                provider.deliver(&config, &recipient, &content, &task.idempotency_key),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => DeliveryOutcome::transient(format!(
                    "provider call timed out after {}ms",
                    self.context.provider_timeout.as_millis()
                )),
            };
            results.push(RecipientResult { recipient, outcome });
        }

        let outcome = self.context.classifier.classify_attempt(&results);
        debug!(
            task_id = %task.task_id,
            provider = %provider.name(),
            recipients = results.len(),
            outcome = ?outcome,
            "Provider attempt finished"
        );

        Ok(DeliveryAttempt {
            attempt_number: task.attempts + 1,
            started_at,
            finished_at: Utc::now(),
            outcome,
            results,
        })
    }

    /// Pinned content if an earlier attempt rendered, otherwise render and pin
    async fn content_for(&self, task: &mut DeliveryTask) -> Result<RenderedContent> {
        if let Some(content) = &task.rendered {
            return Ok(content.clone());
        }
        let content = self
            .context
            .renderer
            .render(
                &task.tenant_id,
                task.channel,
                &task.template_name,
                &task.language,
                &task.variables,
            )
            .await?;
        task.rendered = Some(content.clone());
        Ok(content)
    }

    async fn handle_pre_dispatch_error(
        &self,
        task: &mut DeliveryTask,
        error: NotificationError,
    ) -> Result<SchedulingDecision> {
        let scheduler = &self.context.scheduler;
        match self.context.classifier.classify_error(&error) {
            ErrorDisposition::Defer(delay) => {
                debug!(task_id = %task.task_id, error = %error, "Deferring task");
                self.queue.requeue(task.task_id, delay);
                Ok(SchedulingDecision::Deferred(delay))
            }
            ErrorDisposition::Retry => {
                let message = error.to_string();
                task.record_attempt(DeliveryAttempt {
                    attempt_number: task.attempts + 1,
                    started_at: Utc::now(),
                    finished_at: Utc::now(),
                    outcome: OutcomeKind::TransientFailure,
                    results: Vec::new(),
                });
                let resolution =
                    scheduler.decide(task, OutcomeKind::TransientFailure, Some(message));
                scheduler.resolve(task, resolution).await
            }
            ErrorDisposition::DeadLetter(reason) => {
                warn!(
                    task_id = %task.task_id,
                    tenant_id = %task.tenant_id,
                    channel = %task.channel,
                    reason = %reason,
                    error = %error,
                    "Task cannot be dispatched"
                );
                let resolution = PendingResolution::DeadLetter {
                    reason,
                    detail: failure_detail(&error),
                };
                scheduler.resolve(task, resolution).await
            }
        }
    }
}

/// Last-error text recorded for a task failed before dispatch
fn failure_detail(error: &NotificationError) -> String {
    match error {
        NotificationError::TemplateRender(render_error) => {
            format!("{}: {render_error}", render_error.reason_code())
        }
        other => other.to_string(),
    }
}

/// Spawn `concurrency` workers for one channel's queue
pub fn spawn_worker_pool(
    queue: Arc<DeliveryQueue>,
    context: Arc<DispatchContext>,
    concurrency: usize,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let channel = queue.channel();
    (0..concurrency.max(1))
        .map(|index| {
            let worker = DispatchWorker::new(
                format!("{}-worker-{index}", channel.as_str().to_ascii_lowercase()),
                queue.clone(),
                context.clone(),
            );
            tokio::spawn(worker.run(shutdown.clone()))
        })
        .collect()
}

//! # Notification Engine
//!
//! The embeddable facade over the orchestration core. The builder wires the
//! collaborators (in-memory ones unless others are supplied), `start` spawns
//! the per-channel worker pools and `shutdown` stops them gracefully.
//!
//! ```rust,no_run
//! use notification_core::models::RawNotificationRequest;
//! use notification_core::orchestration::NotificationEngine;
//!
//! # async fn example() -> notification_core::Result<()> {
//! let engine = NotificationEngine::builder().with_logging_providers().build()?;
//! engine.start()?;
//!
//! let receipt = engine
//!     .submit(
//!         RawNotificationRequest::new("acme", "welcome")
//!             .with_recipient("ada@example.com")
//!             .with_channel("EMAIL")
//!             .with_variable("firstName", "Ada"),
//!     )
//!     .await?;
//! let statuses = engine.status(&receipt.request_id).await?;
//! # let _ = statuses;
//! engine.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use super::backoff_calculator::{BackoffCalculator, BackoffCalculatorConfig};
use super::dead_letter_handler::DeadLetterHandler;
use super::delivery_queue::{DeliveryQueues, QueueStats};
use super::dispatch_worker::{spawn_worker_pool, DispatchContext};
use super::error_classifier::{ErrorClassifier, ErrorClassifierConfig, StandardErrorClassifier};
use super::notification_router::{NotificationRouter, RoutingReport};
use super::rate_limiter::RateLimiter;
use super::request_validator::RequestValidator;
use super::retry_scheduler::RetryScheduler;
use super::status_ledger::StatusLedger;
use super::template_renderer::TemplateRenderer;
use super::tenant_config_resolver::TenantConfigResolver;
use crate::config::{ConfigManager, NotificationConfig};
use crate::constants::ChannelKind;
use crate::error::{NotificationError, Result};
use crate::logging::log_task_operation;
use crate::models::{
    ChannelStatus, DeadLetterRecord, DeliveryTask, NotificationLog, RawNotificationRequest,
};
use crate::registry::{ChannelProvider, LoggingProvider, ProviderRegistry, RegistryStats};
use crate::state_machine::{DeliveryEvent, DeliveryStateMachine, DeliveryStatus};
use crate::store::{
    ConfigurationStore, DeadLetterSink, InMemoryConfigurationStore, InMemoryDeadLetterSink,
    InMemoryLedgerStore, InMemoryTaskRepository, LedgerStore, TaskRepository,
};
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Returned to the intake caller once a request is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub request_id: String,
    pub accepted_at: DateTime<Utc>,
    pub routing: RoutingReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "status", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// A scheduled task was cancelled before its due time
    Cancelled,
    /// The task is claimed; it will not be retried after the current attempt
    Suppressed,
    /// Already promoted and waiting on its queue; cancellation is a no-op
    NotCancellable(DeliveryStatus),
    AlreadyTerminal(DeliveryStatus),
}

struct WorkerRuntime {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct NotificationEngine {
    config: NotificationConfig,
    validator: RequestValidator,
    router: NotificationRouter,
    resolver: Arc<TenantConfigResolver>,
    ledger: Arc<StatusLedger>,
    repository: Arc<dyn TaskRepository>,
    state_machine: Arc<DeliveryStateMachine>,
    dead_letters: Arc<DeadLetterHandler>,
    queues: Arc<DeliveryQueues>,
    suppressed: Arc<DashSet<Uuid>>,
    context: Arc<DispatchContext>,
    runtime: Mutex<Option<WorkerRuntime>>,
}

impl NotificationEngine {
    pub fn builder() -> NotificationEngineBuilder {
        NotificationEngineBuilder::default()
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Spawn the worker pool of every channel
    pub fn start(&self) -> Result<()> {
        let mut runtime = self.runtime.lock();
        if runtime.is_some() {
            return Err(NotificationError::EngineState(
                "engine is already running".to_string(),
            ));
        }

        let (shutdown, receiver) = watch::channel(false);
        let concurrency = self.config.workers.concurrency_per_channel;
        let mut handles = Vec::new();
        for channel in ChannelKind::ALL {
            handles.extend(spawn_worker_pool(
                self.queues.queue(channel),
                self.context.clone(),
                concurrency,
                &receiver,
            ));
        }

        info!(
            workers = handles.len(),
            concurrency_per_channel = concurrency,
            providers = ?self.context.providers.stats().channels,
            "Notification engine started"
        );
        *runtime = Some(WorkerRuntime { shutdown, handles });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.runtime.lock().is_some()
    }

    /// Signal every worker and wait for in-flight attempts to finish
    pub async fn shutdown(&self) -> Result<()> {
        let Some(runtime) = self.runtime.lock().take() else {
            warn!("Notification engine already stopped");
            return Ok(());
        };

        if runtime.shutdown.send(true).is_err() {
            warn!("All dispatch workers had already exited");
        }
        for result in join_all(runtime.handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Dispatch worker ended abnormally");
            }
        }
        info!("Notification engine stopped");
        Ok(())
    }

    /// Validate and route a request. Validation failures create no task.
    #[instrument(skip(self, raw), fields(tenant_id = ?raw.tenant_id))]
    pub async fn submit(&self, raw: RawNotificationRequest) -> Result<SubmissionReceipt> {
        let accepted_at = Utc::now();
        let request = self.validator.validate(raw, accepted_at).await?;
        let routing = self.router.route(&request).await;

        log_task_operation(
            "submit",
            &request.tenant_id,
            &request.request_id,
            None,
            None,
            "accepted",
            Some(&format!(
                "created={} duplicates={} failures={}",
                routing.created(),
                routing.duplicates(),
                routing.failures()
            )),
        );

        Ok(SubmissionReceipt {
            request_id: request.request_id,
            accepted_at,
            routing,
        })
    }

    /// Per-channel status of a request, served from the ledger
    pub async fn status(&self, request_id: &str) -> Result<Vec<ChannelStatus>> {
        let statuses = self.ledger.get_status(request_id).await?;
        if statuses.is_empty() {
            return Err(NotificationError::RequestNotFound(request_id.to_string()));
        }
        Ok(statuses)
    }

    pub async fn task_status(&self, task_id: Uuid) -> Result<ChannelStatus> {
        self.ledger
            .task_status(task_id)
            .await?
            .ok_or(NotificationError::TaskNotFound(task_id))
    }

    pub async fn task(&self, task_id: Uuid) -> Result<DeliveryTask> {
        self.repository
            .get(task_id)
            .await?
            .ok_or(NotificationError::TaskNotFound(task_id))
    }

    pub async fn history(&self, task_id: Uuid) -> Result<Vec<NotificationLog>> {
        self.ledger.history(task_id).await
    }

    pub async fn tenant_history(&self, tenant_id: &str) -> Result<Vec<NotificationLog>> {
        self.ledger.tenant_history(tenant_id).await
    }

    /// Cancel a task.
    ///
    /// Only a scheduled task that is still waiting on its queue is cancelled
    /// outright. A claimed task finishes its current attempt and is then
    /// cancelled instead of retried.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: Uuid) -> Result<CancelOutcome> {
        let mut task = self.task(task_id).await?;
        if task.is_terminal() {
            return Ok(CancelOutcome::AlreadyTerminal(task.status));
        }

        let queue = self.queues.queue(task.channel);
        if task.status == DeliveryStatus::PendingSchedule && queue.cancel(task_id) {
            return match self
                .state_machine
                .transition(&mut task, DeliveryEvent::Cancel)
                .await
            {
                Ok(_) => {
                    log_task_operation(
                        "cancel",
                        &task.tenant_id,
                        &task.request_id,
                        Some(task_id),
                        Some(task.channel),
                        task.status.as_str(),
                        None,
                    );
                    Ok(CancelOutcome::Cancelled)
                }
                Err(e) => {
                    // Hand the cancellation to a worker, which parks it if the ledger stays down
                    self.suppressed.insert(task_id);
                    queue.enqueue(task_id, Instant::now());
                    Err(e)
                }
            };
        }

        if queue.is_claimed(task_id) {
            self.suppressed.insert(task_id);
            info!(task_id = %task_id, "Claimed task suppressed from further retries");
            return Ok(CancelOutcome::Suppressed);
        }

        Ok(CancelOutcome::NotCancellable(task.status))
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetterRecord>> {
        self.dead_letters.list().await
    }

    pub async fn dead_letter(&self, task_id: Uuid) -> Result<Option<DeadLetterRecord>> {
        self.dead_letters.get(task_id).await
    }

    /// Drop cached configuration so tenant changes apply immediately
    pub fn invalidate_tenant(&self, tenant_id: &str) {
        self.resolver.invalidate(tenant_id);
    }

    pub fn queue_stats(&self) -> HashMap<ChannelKind, QueueStats> {
        self.queues.stats()
    }

    pub fn provider_stats(&self) -> RegistryStats {
        self.context.providers.stats()
    }
}

/// Wires an engine from configuration and collaborators
#[derive(Default)]
pub struct NotificationEngineBuilder {
    config: Option<NotificationConfig>,
    configuration_store: Option<Arc<dyn ConfigurationStore>>,
    task_repository: Option<Arc<dyn TaskRepository>>,
    ledger_store: Option<Arc<dyn LedgerStore>>,
    dead_letter_sink: Option<Arc<dyn DeadLetterSink>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    providers: ProviderRegistry,
}

impl NotificationEngineBuilder {
    pub fn with_config(mut self, config: NotificationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_config_manager(self, manager: &ConfigManager) -> Self {
        self.with_config(manager.config().clone())
    }

    pub fn with_configuration_store(mut self, store: Arc<dyn ConfigurationStore>) -> Self {
        self.configuration_store = Some(store);
        self
    }

    pub fn with_task_repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.task_repository = Some(repository);
        self
    }

    pub fn with_ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = Some(store);
        self
    }

    pub fn with_dead_letter_sink(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter_sink = Some(sink);
        self
    }

    pub fn with_error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ChannelProvider>) -> Self {
        self.providers.register(provider);
        self
    }

    /// Register a [`LoggingProvider`] for every channel without a provider
    pub fn with_logging_providers(mut self) -> Self {
        for channel in ChannelKind::ALL {
            if !self.providers.contains(channel) {
                self.providers.register(Arc::new(LoggingProvider::new(channel)));
            }
        }
        self
    }

    pub fn build(self) -> Result<NotificationEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let configuration_store = self
            .configuration_store
            .unwrap_or_else(|| Arc::new(InMemoryConfigurationStore::new()));
        let repository = self
            .task_repository
            .unwrap_or_else(|| Arc::new(InMemoryTaskRepository::new()));
        let ledger_store = self
            .ledger_store
            .unwrap_or_else(|| Arc::new(InMemoryLedgerStore::new()));
        let dead_letter_sink = self
            .dead_letter_sink
            .unwrap_or_else(|| Arc::new(InMemoryDeadLetterSink::new()));
        let classifier = self.classifier.unwrap_or_else(|| {
            Arc::new(StandardErrorClassifier::with_config(ErrorClassifierConfig {
                defer_delay: config.engine.defer_delay(),
            }))
        });

        let default_language = config.engine.default_language.clone();
        let resolver = Arc::new(TenantConfigResolver::new(
            configuration_store.clone(),
            config.cache.config_ttl(),
        ));
        let renderer = Arc::new(TemplateRenderer::new(
            configuration_store,
            default_language.clone(),
        ));
        let ledger = Arc::new(StatusLedger::new(ledger_store, config.ledger.clone()));
        let state_machine = Arc::new(DeliveryStateMachine::new(
            ledger.clone(),
            repository.clone(),
        ));
        let dead_letters = Arc::new(DeadLetterHandler::new(
            dead_letter_sink,
            state_machine.clone(),
        ));
        let queues = Arc::new(DeliveryQueues::new());
        let suppressed = Arc::new(DashSet::new());
        let scheduler = Arc::new(RetryScheduler::new(
            BackoffCalculator::new(BackoffCalculatorConfig::from_config(&config)),
            state_machine.clone(),
            dead_letters.clone(),
            repository.clone(),
            queues.clone(),
            suppressed.clone(),
            config.engine.defer_delay(),
        ));

        for channel in ChannelKind::ALL {
            if !self.providers.contains(channel) {
                warn!(
                    channel = %channel,
                    "No provider registered; tasks on this channel will be dead-lettered"
                );
            }
        }

        let context = Arc::new(DispatchContext {
            repository: repository.clone(),
            resolver: resolver.clone(),
            renderer,
            providers: Arc::new(self.providers),
            rate_limiter: Arc::new(RateLimiter::new()),
            classifier,
            scheduler,
            state_machine: state_machine.clone(),
            suppressed: suppressed.clone(),
            provider_timeout: config.engine.provider_call_timeout(),
            defer_delay: config.engine.defer_delay(),
        });

        Ok(NotificationEngine {
            validator: RequestValidator::new(resolver.clone(), default_language),
            router: NotificationRouter::new(
                repository.clone(),
                state_machine.clone(),
                queues.clone(),
            ),
            resolver,
            ledger,
            repository,
            state_machine,
            dead_letters,
            queues,
            suppressed,
            context,
            config,
            runtime: Mutex::new(None),
        })
    }
}

use super::mocks::ScriptedProvider;
use notification_core::config::{EngineConfig, LedgerConfig, NotificationConfig, RetryConfig};
use notification_core::models::{
    ChannelConfig, ChannelStatus, RawNotificationRequest, Template, TemplateKey, Tenant,
};
use notification_core::store::{
    DeadLetterSink, InMemoryConfigurationStore, InMemoryTaskRepository, LedgerStore,
    TaskRepository,
};
use notification_core::{ChannelKind, DeliveryStatus, NotificationEngine};
use std::sync::Arc;
use std::time::Duration;

pub const TENANT: &str = "acme";
pub const TEMPLATE: &str = "welcome";

/// Tenant "acme" with every channel configured and a "welcome" template per channel
pub fn seeded_store() -> Arc<InMemoryConfigurationStore> {
    let store = Arc::new(InMemoryConfigurationStore::new());
    let mut tenant = Tenant::new(TENANT, "Acme Corp");
    for channel in ChannelKind::ALL {
        tenant = tenant.with_channel(channel);
        store.put_channel_config(ChannelConfig::new(
            TENANT,
            channel,
            format!("{}-provider", channel.as_str().to_ascii_lowercase()),
            format!("cred/{TENANT}/{channel}"),
        ));
        let mut template = Template::new(
            TemplateKey::new(TENANT, channel, TEMPLATE, "en"),
            "Hello {{ firstName }}, welcome aboard.",
        )
        .with_required(&["firstName"]);
        if channel == ChannelKind::Email {
            template = template.with_subject("Welcome, {{ firstName }}");
        }
        store.put_template(template);
    }
    store.put_tenant(tenant);
    store
}

/// Deterministic retry timing: no jitter, 1 s base, three attempts
pub fn test_config() -> NotificationConfig {
    NotificationConfig {
        engine: EngineConfig {
            provider_call_timeout_ms: 5_000,
            defer_delay_ms: 200,
            ..Default::default()
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
            jitter_window_ms: 0,
        },
        ledger: LedgerConfig {
            write_retry_attempts: 2,
            write_retry_delay_ms: 5,
        },
        ..Default::default()
    }
}

/// A valid request for the seeded tenant
pub fn welcome_request(request_id: &str, channels: &[&str]) -> RawNotificationRequest {
    channels.iter().fold(
        RawNotificationRequest::new(TENANT, TEMPLATE)
            .with_request_id(request_id)
            .with_recipient("ada@example.com")
            .with_variable("firstName", "Ada"),
        |request, channel| request.with_channel(*channel),
    )
}

/// Engine wiring for integration tests
pub struct TestEngine {
    config: NotificationConfig,
    store: Arc<InMemoryConfigurationStore>,
    repository: Arc<dyn TaskRepository>,
    ledger: Option<Arc<dyn LedgerStore>>,
    sink: Option<Arc<dyn DeadLetterSink>>,
    providers: Vec<Arc<ScriptedProvider>>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            store: seeded_store(),
            repository: Arc::new(InMemoryTaskRepository::new()),
            ledger: None,
            sink: None,
            providers: Vec::new(),
        }
    }

    pub fn config(mut self, edit: impl FnOnce(&mut NotificationConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn store(mut self, store: Arc<InMemoryConfigurationStore>) -> Self {
        self.store = store;
        self
    }

    pub fn repository(mut self, repository: Arc<dyn TaskRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn provider(mut self, provider: Arc<ScriptedProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build and start the engine; channels without a scripted provider log only
    pub fn start(self) -> NotificationEngine {
        let mut builder = NotificationEngine::builder()
            .with_config(self.config)
            .with_configuration_store(self.store)
            .with_task_repository(self.repository);
        if let Some(ledger) = self.ledger {
            builder = builder.with_ledger_store(ledger);
        }
        if let Some(sink) = self.sink {
            builder = builder.with_dead_letter_sink(sink);
        }
        for provider in self.providers {
            builder = builder.with_provider(provider);
        }

        let engine = builder
            .with_logging_providers()
            .build()
            .expect("test engine should build");
        engine.start().expect("test engine should start");
        engine
    }
}

/// Poll the ledger until every channel of the request is terminal.
///
/// Meant for paused-clock tests, where the sleeps cost nothing.
pub async fn wait_until_terminal(
    engine: &NotificationEngine,
    request_id: &str,
) -> Vec<ChannelStatus> {
    wait_for(engine, request_id, |statuses| {
        statuses.iter().all(|status| status.status.is_terminal())
    })
    .await
}

/// Poll the ledger until `done` holds for the request's statuses
pub async fn wait_for(
    engine: &NotificationEngine,
    request_id: &str,
    done: impl Fn(&[ChannelStatus]) -> bool,
) -> Vec<ChannelStatus> {
    for _ in 0..10_000 {
        if let Ok(statuses) = engine.status(request_id).await {
            if done(&statuses) {
                return statuses;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("request {request_id} never reached the expected state");
}

pub fn status_of(statuses: &[ChannelStatus], channel: ChannelKind) -> &ChannelStatus {
    statuses
        .iter()
        .find(|status| status.channel == channel)
        .unwrap_or_else(|| panic!("no status for {channel}"))
}

pub fn statuses_of(statuses: &[ChannelStatus]) -> Vec<(ChannelKind, DeliveryStatus)> {
    let mut pairs: Vec<_> = statuses.iter().map(|s| (s.channel, s.status)).collect();
    pairs.sort();
    pairs
}

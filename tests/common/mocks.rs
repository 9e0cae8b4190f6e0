use async_trait::async_trait;
use notification_core::error::StoreError;
use notification_core::models::{
    ChannelConfig, DeadLetterRecord, DeliveryOutcome, DeliveryTask, IdempotencyKey,
    NotificationLog, RenderedContent,
};
use notification_core::store::{
    DeadLetterSink, InMemoryDeadLetterSink, InMemoryLedgerStore, InMemoryTaskRepository,
    LedgerStore, StoreResult, TaskRepository,
};
use notification_core::ChannelKind;
use notification_core::ChannelProvider;
use notification_core::DeliveryStatus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One provider call as the provider saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub recipient: String,
    pub body: String,
    pub idempotency_key: IdempotencyKey,
}

type DeliverHook = Box<dyn Fn(usize) + Send + Sync>;

/// Provider that replays a script of outcomes, then keeps delivering
pub struct ScriptedProvider {
    channel: ChannelKind,
    script: Mutex<VecDeque<DeliveryOutcome>>,
    fallback: Mutex<DeliveryOutcome>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
    on_deliver: Option<DeliverHook>,
}

impl ScriptedProvider {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(DeliveryOutcome::delivered("scripted")),
            delay: None,
            calls: Mutex::new(Vec::new()),
            on_deliver: None,
        }
    }

    /// Outcomes returned by the next calls, in order
    pub fn with_script(self, outcomes: Vec<DeliveryOutcome>) -> Self {
        *self.script.lock() = outcomes.into();
        self
    }

    /// Outcome once the script runs out
    pub fn always(self, outcome: DeliveryOutcome) -> Self {
        *self.fallback.lock() = outcome;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Called with the 1-based call number before the outcome is returned
    pub fn on_deliver(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_deliver = Some(Box::new(hook));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChannelProvider for ScriptedProvider {
    fn channel(&self) -> ChannelKind {
        self.channel
    }

    fn name(&self) -> &str {
        "scripted"
    }

    async fn deliver(
        &self,
        _config: &ChannelConfig,
        recipient: &str,
        content: &RenderedContent,
        idempotency_key: &IdempotencyKey,
    ) -> DeliveryOutcome {
        let call_number = {
            let mut calls = self.calls.lock();
            calls.push(RecordedCall {
                recipient: recipient.to_string(),
                body: content.body.clone(),
                idempotency_key: idempotency_key.clone(),
            });
            calls.len()
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = &self.on_deliver {
            hook(call_number);
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().clone())
    }
}

/// Ledger whose appends can be switched off; reads always work
#[derive(Debug, Default)]
pub struct FlakyLedgerStore {
    inner: InMemoryLedgerStore,
    failing: AtomicBool,
}

impl FlakyLedgerStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl LedgerStore for FlakyLedgerStore {
    async fn append(&self, entry: NotificationLog) -> StoreResult<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger offline".to_string()));
        }
        self.inner.append(entry).await
    }

    async fn entries_for_task(&self, task_id: Uuid) -> StoreResult<Vec<NotificationLog>> {
        self.inner.entries_for_task(task_id).await
    }

    async fn entries_for_request(&self, request_id: &str) -> StoreResult<Vec<NotificationLog>> {
        self.inner.entries_for_request(request_id).await
    }

    async fn entries_for_tenant(&self, tenant_id: &str) -> StoreResult<Vec<NotificationLog>> {
        self.inner.entries_for_tenant(tenant_id).await
    }
}

/// Dead-letter sink whose writes can be switched off
#[derive(Debug, Default)]
pub struct FlakyDeadLetterSink {
    inner: InMemoryDeadLetterSink,
    failing: AtomicBool,
}

impl FlakyDeadLetterSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait]
impl DeadLetterSink for FlakyDeadLetterSink {
    async fn record(&self, record: &DeadLetterRecord) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("dead-letter store offline".to_string()));
        }
        self.inner.record(record).await
    }

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeadLetterRecord>> {
        self.inner.get(task_id).await
    }

    async fn list(&self) -> StoreResult<Vec<DeadLetterRecord>> {
        self.inner.list().await
    }
}

/// Task repository whose writes can be switched off, or failed once for a
/// chosen status; reads always work
#[derive(Debug, Default)]
pub struct FlakyTaskRepository {
    inner: InMemoryTaskRepository,
    failing: AtomicBool,
    fail_once_for: Mutex<Option<DeliveryStatus>>,
    failed_puts: AtomicUsize,
}

impl FlakyTaskRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `put` of a task in `status`
    pub fn fail_next_put_with_status(&self, status: DeliveryStatus) {
        *self.fail_once_for.lock() = Some(status);
    }

    pub fn failed_puts(&self) -> usize {
        self.failed_puts.load(Ordering::SeqCst)
    }

    fn refuse(&self) -> StoreResult<()> {
        self.failed_puts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("task store offline".to_string()))
    }
}

#[async_trait]
impl TaskRepository for FlakyTaskRepository {
    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeliveryTask>> {
        self.inner.get(task_id).await
    }

    async fn put(&self, task: DeliveryTask) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return self.refuse();
        }
        let fail_once = {
            let mut fail_once_for = self.fail_once_for.lock();
            let matches = *fail_once_for == Some(task.status);
            if matches {
                *fail_once_for = None;
            }
            matches
        };
        if fail_once {
            return self.refuse();
        }
        self.inner.put(task).await
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> StoreResult<Option<DeliveryTask>> {
        self.inner.find_by_key(key).await
    }

    async fn insert_if_absent(&self, task: DeliveryTask) -> StoreResult<Option<DeliveryTask>> {
        if self.failing.load(Ordering::SeqCst) {
            return self.refuse().map(|_| None);
        }
        self.inner.insert_if_absent(task).await
    }

    async fn compare_and_swap(
        &self,
        key: &IdempotencyKey,
        expected: Uuid,
        replacement: DeliveryTask,
    ) -> StoreResult<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return self.refuse().map(|_| false);
        }
        self.inner.compare_and_swap(key, expected, replacement).await
    }

    async fn remove(&self, task_id: Uuid) -> StoreResult<()> {
        self.inner.remove(task_id).await
    }

    async fn tasks_for_request(&self, request_id: &str) -> StoreResult<Vec<DeliveryTask>> {
        self.inner.tasks_for_request(request_id).await
    }
}

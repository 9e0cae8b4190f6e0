use super::StoreResult;
use crate::models::NotificationLog;
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

/// Append-only status ledger storage
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an entry and return the sequence number assigned to it
    async fn append(&self, entry: NotificationLog) -> StoreResult<u64>;

    async fn entries_for_task(&self, task_id: Uuid) -> StoreResult<Vec<NotificationLog>>;

    async fn entries_for_request(&self, request_id: &str) -> StoreResult<Vec<NotificationLog>>;

    async fn entries_for_tenant(&self, tenant_id: &str) -> StoreResult<Vec<NotificationLog>>;
}

/// Ledger kept in a single ordered vector
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: RwLock<Vec<NotificationLog>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn select(&self, predicate: impl Fn(&NotificationLog) -> bool) -> Vec<NotificationLog> {
        self.entries
            .read()
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, mut entry: NotificationLog) -> StoreResult<u64> {
        let mut entries = self.entries.write();
        let sequence = entries.len() as u64 + 1;
        entry.sequence = sequence;
        entries.push(entry);
        Ok(sequence)
    }

    async fn entries_for_task(&self, task_id: Uuid) -> StoreResult<Vec<NotificationLog>> {
        Ok(self.select(|entry| entry.task_id == task_id))
    }

    async fn entries_for_request(&self, request_id: &str) -> StoreResult<Vec<NotificationLog>> {
        Ok(self.select(|entry| entry.request_id == request_id))
    }

    async fn entries_for_tenant(&self, tenant_id: &str) -> StoreResult<Vec<NotificationLog>> {
        Ok(self.select(|entry| entry.tenant_id == tenant_id))
    }
}

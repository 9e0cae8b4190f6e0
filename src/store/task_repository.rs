use super::StoreResult;
use crate::models::{DeliveryTask, IdempotencyKey};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Durable home of delivery tasks and the idempotency index
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeliveryTask>>;

    /// Replace the stored copy of an existing task
    async fn put(&self, task: DeliveryTask) -> StoreResult<()>;

    async fn find_by_key(&self, key: &IdempotencyKey) -> StoreResult<Option<DeliveryTask>>;

    /// Store the task and bind its idempotency key, unless the key is already
    /// bound. Returns the task currently holding the key in that case.
    async fn insert_if_absent(&self, task: DeliveryTask) -> StoreResult<Option<DeliveryTask>>;

    /// Rebind `key` from `expected` to `replacement` and store the replacement.
    /// Returns false, storing nothing, when the key no longer points at `expected`.
    async fn compare_and_swap(
        &self,
        key: &IdempotencyKey,
        expected: Uuid,
        replacement: DeliveryTask,
    ) -> StoreResult<bool>;

    /// Drop a task and release its key if the key still points at it
    async fn remove(&self, task_id: Uuid) -> StoreResult<()>;

    /// Every task created for a request, oldest first
    async fn tasks_for_request(&self, request_id: &str) -> StoreResult<Vec<DeliveryTask>>;
}

/// Task repository on concurrent hash maps
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<Uuid, DeliveryTask>,
    keys: DashMap<IdempotencyKey, Uuid>,
    by_request: DashMap<String, Vec<Uuid>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn index_request(&self, task: &DeliveryTask) {
        self.by_request
            .entry(task.request_id.clone())
            .or_default()
            .push(task.task_id);
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeliveryTask>> {
        Ok(self.tasks.get(&task_id).map(|task| task.clone()))
    }

    async fn put(&self, task: DeliveryTask) -> StoreResult<()> {
        self.tasks.insert(task.task_id, task);
        Ok(())
    }

    async fn find_by_key(&self, key: &IdempotencyKey) -> StoreResult<Option<DeliveryTask>> {
        let task_id = match self.keys.get(key) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        self.get(task_id).await
    }

    async fn insert_if_absent(&self, task: DeliveryTask) -> StoreResult<Option<DeliveryTask>> {
        // The key shard stays locked until the task is stored, so a reader
        // that sees the binding always finds the task.
        match self.keys.entry(task.idempotency_key.clone()) {
            Entry::Occupied(existing) => {
                let task_id = *existing.get();
                Ok(self.tasks.get(&task_id).map(|task| task.clone()))
            }
            Entry::Vacant(slot) => {
                self.index_request(&task);
                let task_id = task.task_id;
                self.tasks.insert(task_id, task);
                slot.insert(task_id);
                Ok(None)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &IdempotencyKey,
        expected: Uuid,
        replacement: DeliveryTask,
    ) -> StoreResult<bool> {
        let Some(mut binding) = self.keys.get_mut(key) else {
            return Ok(false);
        };
        if *binding != expected {
            return Ok(false);
        }

        self.index_request(&replacement);
        let task_id = replacement.task_id;
        self.tasks.insert(task_id, replacement);
        *binding = task_id;
        Ok(true)
    }

    async fn remove(&self, task_id: Uuid) -> StoreResult<()> {
        if let Some((_, task)) = self.tasks.remove(&task_id) {
            self.keys
                .remove_if(&task.idempotency_key, |_, bound| *bound == task_id);
            if let Some(mut ids) = self.by_request.get_mut(&task.request_id) {
                ids.retain(|id| *id != task_id);
            }
        }
        Ok(())
    }

    async fn tasks_for_request(&self, request_id: &str) -> StoreResult<Vec<DeliveryTask>> {
        let ids = match self.by_request.get(request_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };

        let mut tasks: Vec<DeliveryTask> = ids
            .iter()
            .filter_map(|id| self.tasks.get(id).map(|task| task.clone()))
            .collect();
        tasks.sort_by_key(|task| task.created_at);
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ChannelKind;
    use crate::models::NotificationRequest;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn task(request_id: &str) -> DeliveryTask {
        let request = NotificationRequest {
            request_id: request_id.to_string(),
            tenant_id: "acme".to_string(),
            recipients: vec!["+15550100".to_string()],
            channels: vec![ChannelKind::Sms],
            template_name: "otp".to_string(),
            language: "en".to_string(),
            variables: BTreeMap::new(),
            scheduled_time: None,
            received_at: Utc::now(),
        };
        DeliveryTask::from_request(&request, ChannelKind::Sms, Utc::now())
    }

    #[tokio::test]
    async fn test_insert_if_absent_returns_existing_holder() {
        let repository = InMemoryTaskRepository::new();
        let first = task("req-1");
        let second = task("req-1");

        assert!(repository.insert_if_absent(first.clone()).await.unwrap().is_none());
        let existing = repository.insert_if_absent(second.clone()).await.unwrap();
        assert_eq!(existing.map(|t| t.task_id), Some(first.task_id));
        assert!(repository.get(second.task_id).await.unwrap().is_none());
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_produce_one_task() {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository.insert_if_absent(task("req-race")).await.unwrap().is_none()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(repository.tasks_for_request("req-race").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_compare_and_swap_requires_expected_holder() {
        let repository = InMemoryTaskRepository::new();
        let first = task("req-1");
        let key = first.idempotency_key.clone();
        repository.insert_if_absent(first.clone()).await.unwrap();

        let stale = task("req-1");
        assert!(!repository
            .compare_and_swap(&key, Uuid::new_v4(), stale.clone())
            .await
            .unwrap());
        assert!(repository.get(stale.task_id).await.unwrap().is_none());

        let replacement = task("req-1");
        assert!(repository
            .compare_and_swap(&key, first.task_id, replacement.clone())
            .await
            .unwrap());
        let holder = repository.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!(holder.task_id, replacement.task_id);
        assert_eq!(repository.tasks_for_request("req-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_releases_key() {
        let repository = InMemoryTaskRepository::new();
        let first = task("req-1");
        let key = first.idempotency_key.clone();
        repository.insert_if_absent(first.clone()).await.unwrap();

        repository.remove(first.task_id).await.unwrap();
        assert!(repository.find_by_key(&key).await.unwrap().is_none());
        assert!(repository.tasks_for_request("req-1").await.unwrap().is_empty());
    }
}

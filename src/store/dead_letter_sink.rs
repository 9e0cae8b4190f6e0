use super::StoreResult;
use crate::models::DeadLetterRecord;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Durable store for terminally failed tasks
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Append the record. A task is recorded once: writing again for the
    /// same task succeeds and keeps the first record.
    async fn record(&self, record: &DeadLetterRecord) -> StoreResult<()>;

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeadLetterRecord>>;

    /// Every record, oldest first
    async fn list(&self) -> StoreResult<Vec<DeadLetterRecord>>;
}

#[derive(Debug, Default)]
pub struct InMemoryDeadLetterSink {
    records: DashMap<Uuid, DeadLetterRecord>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn record(&self, record: &DeadLetterRecord) -> StoreResult<()> {
        self.records
            .entry(record.task_id)
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<DeadLetterRecord>> {
        Ok(self.records.get(&task_id).map(|record| record.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<DeadLetterRecord>> {
        let mut records: Vec<DeadLetterRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.dead_lettered_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ChannelKind;
    use crate::models::{DeadLetterReason, DeliveryTask, NotificationRequest};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn task(request_id: &str) -> DeliveryTask {
        let request = NotificationRequest {
            request_id: request_id.to_string(),
            tenant_id: "acme".to_string(),
            recipients: vec!["ada@example.com".to_string()],
            channels: vec![ChannelKind::Email],
            template_name: "welcome".to_string(),
            language: "en".to_string(),
            variables: BTreeMap::new(),
            scheduled_time: None,
            received_at: Utc::now(),
        };
        DeliveryTask::from_request(&request, ChannelKind::Email, Utc::now())
    }

    #[tokio::test]
    async fn test_second_record_for_a_task_keeps_the_first() {
        let sink = InMemoryDeadLetterSink::new();
        let task = task("req-1");
        let first =
            DeadLetterRecord::from_task(&task, DeadLetterReason::PermanentFailure, "bounced");
        let again =
            DeadLetterRecord::from_task(&task, DeadLetterReason::RetriesExhausted, "re-applied");

        sink.record(&first).await.unwrap();
        sink.record(&again).await.unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.get(task.task_id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let sink = InMemoryDeadLetterSink::new();
        let mut older = DeadLetterRecord::from_task(
            &task("req-old"),
            DeadLetterReason::PermanentFailure,
            "bounced",
        );
        older.dead_lettered_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = DeadLetterRecord::from_task(
            &task("req-new"),
            DeadLetterReason::RetriesExhausted,
            "503",
        );

        sink.record(&newer).await.unwrap();
        sink.record(&older).await.unwrap();

        let listed = sink.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].request_id, "req-old");
        assert_eq!(listed[1].request_id, "req-new");
    }
}

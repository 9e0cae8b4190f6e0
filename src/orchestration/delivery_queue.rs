//! # Delivery Queue
//!
//! One logical queue per channel kind, ordered by ready time.
//!
//! ## Claim semantics
//!
//! A task id is either queued, claimed by exactly one worker, or absent.
//! `claim` hands out the earliest task whose ready time has passed and
//! marks it in flight; only the claiming worker may hand it back through
//! `requeue` or `complete`. Enqueuing a task that is already queued or in
//! flight is ignored, so a task is never processed by two workers at once.
//!
//! Entries removed by `cancel` or superseded by a later enqueue stay in the
//! heap and are skipped when they surface.

use crate::constants::ChannelKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// A task handed to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedTask {
    pub task_id: Uuid,
    pub channel: ChannelKind,
    pub claimed_at: DateTime<Utc>,
}

/// Queue depth snapshot for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    ready_at: Instant,
    sequence: u64,
    task_id: Uuid,
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Reverse<QueueEntry>>,
    /// Live sequence number per queued task
    queued: HashMap<Uuid, u64>,
    in_flight: HashSet<Uuid>,
    next_sequence: u64,
}

impl QueueState {
    fn push(&mut self, task_id: Uuid, ready_at: Instant) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.queued.insert(task_id, sequence);
        self.heap.push(Reverse(QueueEntry {
            ready_at,
            sequence,
            task_id,
        }));
    }

    fn is_live(&self, entry: &QueueEntry) -> bool {
        self.queued.get(&entry.task_id) == Some(&entry.sequence)
    }

    /// Pop a ready entry, or report when the next one becomes ready
    fn poll(&mut self, now: Instant) -> Result<Uuid, Option<Instant>> {
        while let Some(Reverse(top)) = self.heap.peek().copied() {
            if !self.is_live(&top) {
                self.heap.pop();
                continue;
            }
            if top.ready_at > now {
                return Err(Some(top.ready_at));
            }
            self.heap.pop();
            self.queued.remove(&top.task_id);
            self.in_flight.insert(top.task_id);
            return Ok(top.task_id);
        }
        Err(None)
    }
}

#[derive(Debug)]
pub struct DeliveryQueue {
    channel: ChannelKind,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl DeliveryQueue {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Add a task that becomes claimable at `ready_at`.
    ///
    /// Returns false when the task is already queued or claimed.
    pub fn enqueue(&self, task_id: Uuid, ready_at: Instant) -> bool {
        {
            let mut state = self.state.lock();
            if state.queued.contains_key(&task_id) || state.in_flight.contains(&task_id) {
                trace!(
                    task_id = %task_id,
                    channel = %self.channel,
                    "Task already queued or claimed"
                );
                return false;
            }
            state.push(task_id, ready_at);
        }
        self.notify.notify_one();
        true
    }

    /// Hand a claimed task back with a new ready time
    pub fn requeue(&self, task_id: Uuid, delay: Duration) {
        {
            let mut state = self.state.lock();
            state.in_flight.remove(&task_id);
            state.push(task_id, Instant::now() + delay);
        }
        debug!(
            task_id = %task_id,
            channel = %self.channel,
            delay_ms = delay.as_millis() as u64,
            "Task requeued"
        );
        self.notify.notify_one();
    }

    /// Release a claimed task for good
    pub fn complete(&self, task_id: Uuid) {
        self.state.lock().in_flight.remove(&task_id);
    }

    /// Remove a queued task that nobody has claimed.
    ///
    /// Returns false when the task is in flight or not queued.
    pub fn cancel(&self, task_id: Uuid) -> bool {
        self.state.lock().queued.remove(&task_id).is_some()
    }

    pub fn is_claimed(&self, task_id: Uuid) -> bool {
        self.state.lock().in_flight.contains(&task_id)
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            queued: state.queued.len(),
            in_flight: state.in_flight.len(),
        }
    }

    /// Claim the next ready task without waiting
    pub fn try_claim(&self) -> Option<ClaimedTask> {
        let claimed = self.state.lock().poll(Instant::now()).ok()?;
        Some(self.claimed(claimed))
    }

    /// Wait for the next ready task. Returns `None` once shutdown is signalled.
    pub async fn claim(&self, shutdown: &mut watch::Receiver<bool>) -> Option<ClaimedTask> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            // Register interest before polling so an enqueue in between is not lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_ready = match self.state.lock().poll(Instant::now()) {
                Ok(task_id) => return Some(self.claimed(task_id)),
                Err(next_ready) => next_ready,
            };

            match next_ready {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                return None;
                            }
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = &mut notified => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                return None;
                            }
                        }
                    }
                }
            }
        }
    }

    fn claimed(&self, task_id: Uuid) -> ClaimedTask {
        ClaimedTask {
            task_id,
            channel: self.channel,
            claimed_at: Utc::now(),
        }
    }
}

/// The full set of channel queues
#[derive(Debug)]
pub struct DeliveryQueues {
    queues: [Arc<DeliveryQueue>; 3],
}

impl DeliveryQueues {
    pub fn new() -> Self {
        Self {
            queues: ChannelKind::ALL.map(|channel| Arc::new(DeliveryQueue::new(channel))),
        }
    }

    pub fn queue(&self, channel: ChannelKind) -> Arc<DeliveryQueue> {
        let index = match channel {
            ChannelKind::Push => 0,
            ChannelKind::Email => 1,
            ChannelKind::Sms => 2,
        };
        self.queues[index].clone()
    }

    pub fn stats(&self) -> HashMap<ChannelKind, QueueStats> {
        self.queues
            .iter()
            .map(|queue| (queue.channel(), queue.stats()))
            .collect()
    }
}

impl Default for DeliveryQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_claims_in_ready_order() {
        let queue = DeliveryQueue::new(ChannelKind::Email);
        let later = Uuid::new_v4();
        let sooner = Uuid::new_v4();
        let now = Instant::now();

        assert!(queue.enqueue(later, now + Duration::from_secs(5)));
        assert!(queue.enqueue(sooner, now));

        assert_eq!(queue.try_claim().map(|c| c.task_id), Some(sooner));
        assert!(queue.try_claim().is_none());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(queue.try_claim().map(|c| c.task_id), Some(later));
    }

    #[tokio::test]
    async fn test_single_owner() {
        let queue = DeliveryQueue::new(ChannelKind::Sms);
        let task_id = Uuid::new_v4();

        assert!(queue.enqueue(task_id, Instant::now()));
        assert!(!queue.enqueue(task_id, Instant::now()));

        let claim = queue.try_claim().unwrap();
        assert!(queue.is_claimed(task_id));
        assert!(!queue.enqueue(task_id, Instant::now()));
        assert!(queue.try_claim().is_none());

        queue.complete(claim.task_id);
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[tokio::test]
    async fn test_cancel_skips_entry() {
        let queue = DeliveryQueue::new(ChannelKind::Push);
        let task_id = Uuid::new_v4();
        queue.enqueue(task_id, Instant::now());

        assert!(queue.cancel(task_id));
        assert!(!queue.cancel(task_id));
        assert!(queue.try_claim().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_waits_for_ready_time() {
        let queue = Arc::new(DeliveryQueue::new(ChannelKind::Email));
        let (_tx, mut rx) = watch::channel(false);
        let task_id = Uuid::new_v4();
        queue.enqueue(task_id, Instant::now() + Duration::from_secs(30));

        let start = Instant::now();
        let claim = queue.claim(&mut rx).await.unwrap();
        assert_eq!(claim.task_id, task_id);
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_claim_returns_none_on_shutdown() {
        let queue = Arc::new(DeliveryQueue::new(ChannelKind::Email));
        let (tx, mut rx) = watch::channel(false);

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.claim(&mut rx).await })
        };
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_requeue_makes_task_claimable_again() {
        let queue = DeliveryQueue::new(ChannelKind::Sms);
        let task_id = Uuid::new_v4();
        queue.enqueue(task_id, Instant::now());
        queue.try_claim().unwrap();

        queue.requeue(task_id, Duration::ZERO);
        assert!(!queue.is_claimed(task_id));
        assert_eq!(queue.try_claim().map(|c| c.task_id), Some(task_id));
    }
}

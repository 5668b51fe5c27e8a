//! In-process [`MessageQueue`] for tests and local runs without Redis.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::dlq::{DlqEntry, DlqStats};
use crate::error::StreamError;
use crate::event::Delivery;
use crate::queue::{MessageQueue, QueueInspector};

#[derive(Default)]
struct Inner {
    next_id: u64,
    ready: VecDeque<Delivery>,
    acked: Vec<Delivery>,
    requeued: Vec<Delivery>,
    dead: Vec<(String, DlqEntry)>,
}

impl Inner {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("0-{}", self.next_id)
    }
}

/// FIFO queue that records how every delivery was settled.
pub struct InMemoryQueue {
    inner: Mutex<Inner>,
    idle_wait: Duration,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            idle_wait: Duration::from_millis(10),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a raw `job` payload and return its entry ID.
    pub fn push(&self, payload: impl Into<String>) -> String {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.ready.push_back(Delivery::new(id.clone(), payload));
        id
    }

    /// Enqueue a delivery as-is (e.g. one without a `job` field).
    pub fn push_delivery(&self, delivery: Delivery) {
        self.lock().ready.push_back(delivery);
    }

    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn acked(&self) -> Vec<Delivery> {
        self.lock().acked.clone()
    }

    /// Originals that were re-published for retry.
    pub fn requeued(&self) -> Vec<Delivery> {
        self.lock().requeued.clone()
    }

    pub fn dead_letters(&self) -> Vec<DlqEntry> {
        self.lock().dead.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Deliveries settled in any way.
    pub fn settled_count(&self) -> usize {
        let inner = self.lock();
        inner.acked.len() + inner.requeued.len() + inner.dead.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn init(&self) -> Result<(), StreamError> {
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, StreamError> {
        let next = self.lock().ready.pop_front();
        if next.is_none() {
            tokio::time::sleep(self.idle_wait).await;
        }
        Ok(next)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), StreamError> {
        self.lock().acked.push(delivery.clone());
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<(), StreamError> {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.ready.push_back(Delivery {
            stream_id: id,
            payload: delivery.payload.clone(),
            retry_count: delivery.retry_count + 1,
        });
        inner.requeued.push(delivery.clone());
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), StreamError> {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.dead.push((id, DlqEntry::from_delivery(delivery, reason)));
        Ok(())
    }
}

#[async_trait]
impl QueueInspector for InMemoryQueue {
    async fn ping(&self) -> Result<(), StreamError> {
        Ok(())
    }

    async fn dlq_stats(&self) -> Result<DlqStats, StreamError> {
        let inner = self.lock();
        Ok(DlqStats {
            stream_name: "memory:dlq".to_string(),
            length: inner.dead.len() as i64,
            oldest_entry_id: inner.dead.first().map(|(id, _)| id.clone()),
            newest_entry_id: inner.dead.last().map(|(id, _)| id.clone()),
        })
    }

    async fn dlq_entries(&self, count: usize) -> Result<Vec<(String, DlqEntry)>, StreamError> {
        Ok(self.lock().dead.iter().take(count).cloned().collect())
    }
}

//! Transport seam between the worker loop and the message broker.

use async_trait::async_trait;

use crate::dlq::{DlqEntry, DlqStats};
use crate::error::StreamError;
use crate::event::Delivery;

/// A consumer-group style queue.
///
/// Every delivery handed out by [`receive`](MessageQueue::receive) must be
/// settled exactly once with `ack`, `requeue` or `reject`; until then the
/// broker keeps it pending.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Create the consumer group (and stream) if needed. Idempotent.
    async fn init(&self) -> Result<(), StreamError>;

    /// Next message, or `None` when none arrived within the block timeout.
    async fn receive(&self) -> Result<Option<Delivery>, StreamError>;

    /// Settle a processed message.
    async fn ack(&self, delivery: &Delivery) -> Result<(), StreamError>;

    /// Re-publish the payload with `retry_count + 1` and settle the original.
    async fn requeue(&self, delivery: &Delivery) -> Result<(), StreamError>;

    /// Copy the message to the dead letter stream and settle the original.
    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), StreamError>;
}

/// Read-only views used by the health and admin endpoints.
#[async_trait]
pub trait QueueInspector: Send + Sync {
    async fn ping(&self) -> Result<(), StreamError>;

    async fn dlq_stats(&self) -> Result<DlqStats, StreamError>;

    async fn dlq_entries(&self, count: usize) -> Result<Vec<(String, DlqEntry)>, StreamError>;
}

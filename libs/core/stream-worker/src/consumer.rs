//! Redis Streams implementation of [`MessageQueue`].
//!
//! Reads one entry at a time through a consumer group. Entries left pending
//! by a crashed consumer are claimed once they have been idle for
//! `claim_idle_ms`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::dlq::{DlqEntry, DlqManager, DlqStats};
use crate::error::StreamError;
use crate::event::{Delivery, JOB_FIELD, RETRY_COUNT_FIELD};
use crate::queue::{MessageQueue, QueueInspector};

type StreamEntries = Vec<(String, Vec<(String, String)>)>;
type StreamReadReply = Vec<(String, StreamEntries)>;

/// How many abandoned entries one claim pass takes over.
const CLAIM_BATCH: usize = 10;

struct ReadState {
    /// Claimed entries waiting to be handed out
    claimed: VecDeque<Delivery>,
    last_claim: Option<Instant>,
}

/// Stream consumer for Redis operations
pub struct StreamConsumer {
    redis: ConnectionManager,
    dlq: DlqManager,
    config: WorkerConfig,
    state: Mutex<ReadState>,
}

impl StreamConsumer {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self {
            dlq: DlqManager::new(redis.clone(), config.dlq_stream.clone()),
            redis,
            config,
            state: Mutex::new(ReadState {
                claimed: VecDeque::new(),
                last_claim: None,
            }),
        }
    }

    async fn read_new(&self) -> Result<Option<Delivery>, StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<Option<StreamReadReply>> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("BLOCK")
            .arg(self.config.block_timeout_ms)
            .arg("COUNT")
            .arg(1)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await;

        let streams = match result {
            Ok(Some(streams)) => streams,
            Ok(None) => return Ok(None),
            Err(e) => return Err(StreamError::Redis(e)),
        };

        Ok(streams
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .map(|(id, fields)| Delivery::from_fields(id, fields))
            .next())
    }

    /// Take over entries another consumer left pending for too long.
    async fn claim_abandoned(&self) -> Result<Vec<Delivery>, StreamError> {
        let mut conn = self.redis.clone();

        // (id, consumer, idle_ms, delivery_count)
        let pending: Vec<(String, String, i64, i64)> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(self.config.claim_idle_ms)
            .arg("-")
            .arg("+")
            .arg(CLAIM_BATCH)
            .query_async(&mut conn)
            .await?;

        if pending.is_empty() {
            return Ok(vec![]);
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms);
        for (id, _, _, _) in &pending {
            cmd.arg(id);
        }

        let entries: StreamEntries = cmd.query_async(&mut conn).await?;
        if !entries.is_empty() {
            warn!(count = entries.len(), "Claimed abandoned messages");
        }

        Ok(entries
            .into_iter()
            .map(|(id, fields)| Delivery::from_fields(id, fields))
            .collect())
    }

    fn claim_due(&self, state: &ReadState) -> bool {
        let interval = Duration::from_millis(self.config.claim_idle_ms);
        state.last_claim.is_none_or(|at| at.elapsed() >= interval)
    }
}

#[async_trait]
impl MessageQueue for StreamConsumer {
    async fn init(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
                Ok(())
            }
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    async fn receive(&self) -> Result<Option<Delivery>, StreamError> {
        {
            let mut state = self.state.lock().await;
            if let Some(delivery) = state.claimed.pop_front() {
                return Ok(Some(delivery));
            }

            if self.claim_due(&state) {
                state.last_claim = Some(Instant::now());
                match self.claim_abandoned().await {
                    Ok(claimed) => state.claimed.extend(claimed),
                    Err(e) => debug!(error = %e, "Error claiming abandoned messages"),
                }
                if let Some(delivery) = state.claimed.pop_front() {
                    return Ok(Some(delivery));
                }
            }
        }

        self.read_new().await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let _: i64 = redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&delivery.stream_id)
            .query_async(&mut conn)
            .await?;

        debug!(stream_id = %delivery.stream_id, "Acknowledged message");
        Ok(())
    }

    async fn requeue(&self, delivery: &Delivery) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let next_retry = delivery.retry_count + 1;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.max_length)
            .arg("*")
            .arg(JOB_FIELD)
            .arg(delivery.payload.as_deref().unwrap_or_default())
            .arg(RETRY_COUNT_FIELD)
            .arg(next_retry)
            .ignore()
            .cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&delivery.stream_id)
            .ignore();

        pipe.query_async::<()>(&mut conn).await?;

        debug!(
            stream_id = %delivery.stream_id,
            retry_count = next_retry,
            "Re-published message for retry"
        );
        Ok(())
    }

    async fn reject(&self, delivery: &Delivery, reason: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let entry = DlqEntry::from_delivery(delivery, reason);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.dlq_max_length)
            .arg("*");
        for (field, value) in entry.to_fields() {
            pipe.arg(field).arg(value);
        }
        pipe.ignore()
            .cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&delivery.stream_id)
            .ignore();

        pipe.query_async::<()>(&mut conn).await?;

        info!(
            stream_id = %delivery.stream_id,
            dlq = %self.config.dlq_stream,
            error = %reason,
            "Moved message to DLQ"
        );
        Ok(())
    }
}

#[async_trait]
impl QueueInspector for StreamConsumer {
    async fn ping(&self) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn dlq_stats(&self) -> Result<DlqStats, StreamError> {
        self.dlq.stats().await
    }

    async fn dlq_entries(&self, count: usize) -> Result<Vec<(String, DlqEntry)>, StreamError> {
        self.dlq.list(count).await
    }
}

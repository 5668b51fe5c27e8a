//! Dead letter stream records and inspection.

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::event::{Delivery, JOB_FIELD, RETRY_COUNT_FIELD};

type StreamEntries = Vec<(String, Vec<(String, String)>)>;

/// A rejected message as written to the dead letter stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Raw `job` field, empty when the original entry had none
    pub payload: String,
    pub error: String,
    pub source_id: String,
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn from_delivery(delivery: &Delivery, error: impl Into<String>) -> Self {
        Self {
            payload: delivery.payload.clone().unwrap_or_default(),
            error: error.into(),
            source_id: delivery.stream_id.clone(),
            retry_count: delivery.retry_count,
            failed_at: Utc::now(),
        }
    }

    /// Flat field list for XADD. The payload stays under `job` so an entry
    /// can be copied back to the source stream unchanged.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (JOB_FIELD, self.payload.clone()),
            ("error", self.error.clone()),
            ("source_id", self.source_id.clone()),
            (RETRY_COUNT_FIELD, self.retry_count.to_string()),
            ("failed_at", self.failed_at.to_rfc3339()),
        ]
    }

    pub fn from_fields(fields: &[(String, String)]) -> Self {
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        };

        Self {
            payload: get(JOB_FIELD),
            error: get("error"),
            source_id: get("source_id"),
            retry_count: get(RETRY_COUNT_FIELD).parse().unwrap_or(0),
            failed_at: DateTime::parse_from_rfc3339(&get("failed_at"))
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

/// DLQ statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqStats {
    pub stream_name: String,
    pub length: i64,
    pub oldest_entry_id: Option<String>,
    pub newest_entry_id: Option<String>,
}

/// Read access to a dead letter stream.
#[derive(Clone)]
pub struct DlqManager {
    redis: ConnectionManager,
    dlq_stream: String,
}

impl DlqManager {
    pub fn new(redis: ConnectionManager, dlq_stream: impl Into<String>) -> Self {
        Self {
            redis,
            dlq_stream: dlq_stream.into(),
        }
    }

    pub async fn stats(&self) -> Result<DlqStats, StreamError> {
        let mut conn = self.redis.clone();

        let length: i64 = conn.xlen(&self.dlq_stream).await?;

        let oldest: StreamEntries = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        let newest: StreamEntries = redis::cmd("XREVRANGE")
            .arg(&self.dlq_stream)
            .arg("+")
            .arg("-")
            .arg("COUNT")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        Ok(DlqStats {
            stream_name: self.dlq_stream.clone(),
            length,
            oldest_entry_id: oldest.into_iter().next().map(|(id, _)| id),
            newest_entry_id: newest.into_iter().next().map(|(id, _)| id),
        })
    }

    /// Oldest entries first.
    pub async fn list(&self, count: usize) -> Result<Vec<(String, DlqEntry)>, StreamError> {
        let mut conn = self.redis.clone();

        let entries: StreamEntries = redis::cmd("XRANGE")
            .arg(&self.dlq_stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(entries
            .into_iter()
            .map(|(id, fields)| (id, DlqEntry::from_fields(&fields)))
            .collect())
    }
}

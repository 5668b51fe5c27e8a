//! Worker configuration

use crate::policy::FailurePolicy;
use crate::registry::StreamDef;
use uuid::Uuid;

/// Configuration for the stream worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,

    pub consumer_group: String,

    /// Unique consumer name within the group (auto-generated if not provided)
    pub consumer_id: String,

    pub dlq_stream: String,

    /// Approximate MAXLEN for re-published retries
    pub max_length: i64,

    /// Approximate MAXLEN for the dead letter stream
    pub dlq_max_length: i64,

    /// How long XREADGROUP blocks waiting for a message
    pub block_timeout_ms: u64,

    /// Pending entries idle longer than this are claimed from dead consumers
    pub claim_idle_ms: u64,

    pub failure_policy: FailurePolicy,
}

impl WorkerConfig {
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            dlq_stream: S::DLQ_STREAM.to_string(),
            max_length: S::MAX_LENGTH,
            dlq_max_length: S::DLQ_MAX_LENGTH,
            ..Self::new(S::STREAM_NAME, S::CONSUMER_GROUP)
        }
    }

    pub fn new(stream_name: impl Into<String>, consumer_group: impl Into<String>) -> Self {
        let stream_name = stream_name.into();
        Self {
            dlq_stream: format!("{}:dlq", stream_name),
            stream_name,
            consumer_group: consumer_group.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            max_length: 100_000,
            dlq_max_length: 10_000,
            block_timeout_ms: 5000,
            claim_idle_ms: 60_000,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_block_timeout_ms(mut self, timeout: u64) -> Self {
        self.block_timeout_ms = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("stream:jobs", "workers")
    }
}

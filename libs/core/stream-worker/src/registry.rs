//! Traits a domain implements to plug into the worker.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::StreamError;

/// Stream definition trait.
///
/// Each domain implements this trait to name its stream, consumer group and
/// dead letter stream in one place.
///
/// ```rust,ignore
/// pub struct MailStream;
///
/// impl StreamDef for MailStream {
///     const STREAM_NAME: &'static str = "q_mail";
///     const CONSUMER_GROUP: &'static str = "mail_workers";
///     const DLQ_STREAM: &'static str = "q_mail:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    const STREAM_NAME: &'static str;

    const CONSUMER_GROUP: &'static str;

    const DLQ_STREAM: &'static str;

    /// Approximate MAXLEN applied when re-publishing retries.
    const MAX_LENGTH: i64 = 100_000;

    /// Approximate MAXLEN of the dead letter stream.
    const DLQ_MAX_LENGTH: i64 = 10_000;
}

/// A job payload carried in the `job` field of a stream entry.
pub trait StreamJob: DeserializeOwned + Send + Sync {
    /// Short identifier for logs (not necessarily unique).
    fn job_id(&self) -> String;
}

/// Trait for job processors.
///
/// Return `Ok(())` to acknowledge the message. Errors carry an
/// [`ErrorCategory`](crate::ErrorCategory) that the worker's
/// [`FailurePolicy`](crate::FailurePolicy) turns into a retry or a rejection.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    /// Processor name for logging and metric labels.
    fn name(&self) -> &'static str;

    /// Override to check downstream dependencies.
    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

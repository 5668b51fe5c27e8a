//! The generic worker loop.
//!
//! Each delivery moves through
//! `received -> parsed -> processed -> acked | retried | rejected`.
//! Exactly one delivery is in flight at a time.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::StreamError;
use crate::event::Delivery;
use crate::metrics::StreamMetrics;
use crate::policy::{Disposition, FailurePolicy};
use crate::queue::MessageQueue;
use crate::registry::{StreamJob, StreamProcessor};

const MAX_BACKOFF_SECS: u64 = 30;

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acked,
    Retried,
    Rejected,
    /// The queue refused the settle command; the message stays pending and
    /// is claimed again later.
    Unsettled,
}

/// Generic stream worker that feeds deliveries from `Q` to processor `P`.
pub struct StreamWorker<J, P, Q>
where
    J: StreamJob,
    P: StreamProcessor<J>,
    Q: MessageQueue,
{
    queue: Arc<Q>,
    processor: Arc<P>,
    policy: FailurePolicy,
    metrics: StreamMetrics,
    _phantom: PhantomData<fn() -> J>,
}

impl<J, P, Q> StreamWorker<J, P, Q>
where
    J: StreamJob,
    P: StreamProcessor<J>,
    Q: MessageQueue,
{
    pub fn new(queue: Arc<Q>, processor: Arc<P>, policy: FailurePolicy, stream_name: &str) -> Self {
        let metrics = StreamMetrics::new(stream_name, processor.name());
        Self {
            queue,
            processor,
            policy,
            metrics,
            _phantom: PhantomData,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// The consumer group is created before the first read. A delivery that
    /// is already being handled is finished before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        self.queue.init().await?;

        info!(
            processor = self.processor.name(),
            policy = %self.policy,
            "Starting stream worker"
        );

        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                received = self.queue.receive() => received,
            };

            match received {
                Ok(Some(delivery)) => {
                    if consecutive_errors > 0 {
                        info!(errors = consecutive_errors, "Queue recovered");
                        consecutive_errors = 0;
                    }
                    self.handle_until(delivery, Some(&mut shutdown)).await;
                }
                Ok(None) => {}
                Err(e) if e.is_nogroup() => {
                    warn!("Consumer group missing, recreating");
                    if let Err(e) = self.queue.init().await {
                        error!(error = %e, "Failed to recreate consumer group");
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let backoff = Duration::from_secs(
                        2u64.pow(consecutive_errors.min(5)).min(MAX_BACKOFF_SECS),
                    );
                    warn!(
                        error = %e,
                        consecutive_errors,
                        backoff_secs = backoff.as_secs(),
                        "Failed to read from queue, backing off"
                    );
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!("Stream worker stopped");
        Ok(())
    }

    /// Parse, process and settle a single delivery.
    pub async fn handle(&self, delivery: Delivery) -> Outcome {
        self.handle_until(delivery, None).await
    }

    /// Like [`handle`](Self::handle), but a shutdown request cuts the retry
    /// backoff short. The delivery is still re-published.
    async fn handle_until(
        &self,
        delivery: Delivery,
        shutdown: Option<&mut watch::Receiver<bool>>,
    ) -> Outcome {
        self.metrics.job_received();

        let job: J = match delivery.parse() {
            Ok(job) => job,
            Err(e) => {
                self.metrics.parse_failed();
                warn!(
                    stream_id = %delivery.stream_id,
                    payload = delivery.payload.as_deref().unwrap_or("<missing>"),
                    error = %e,
                    "Rejecting unparsable message"
                );
                return self.reject(&delivery, &e.to_string()).await;
            }
        };

        let job_id = job.job_id();
        debug!(stream_id = %delivery.stream_id, job_id = %job_id, "Processing job");

        let start = Instant::now();
        let error = match self.processor.process(&job).await {
            Ok(()) => {
                return match self.queue.ack(&delivery).await {
                    Ok(()) => {
                        self.metrics.job_acked(start.elapsed());
                        Outcome::Acked
                    }
                    Err(e) => {
                        error!(
                            stream_id = %delivery.stream_id,
                            error = %e,
                            "Failed to ACK message"
                        );
                        Outcome::Unsettled
                    }
                };
            }
            Err(e) => e,
        };

        let category = error.category();
        self.metrics.job_failed(category);

        warn!(
            stream_id = %delivery.stream_id,
            job_id = %job_id,
            retry_count = delivery.retry_count,
            payload = delivery.payload.as_deref().unwrap_or_default(),
            error = %error,
            error_category = category.as_str(),
            "Job processing failed"
        );

        match self.policy.decide(category, delivery.retry_count) {
            Disposition::Retry { delay } => {
                info!(
                    job_id = %job_id,
                    retry_attempt = delivery.retry_count + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling job retry with backoff"
                );
                wait_backoff(delay, shutdown).await;

                match self.queue.requeue(&delivery).await {
                    Ok(()) => {
                        self.metrics.job_retried();
                        Outcome::Retried
                    }
                    Err(e) => {
                        error!(
                            stream_id = %delivery.stream_id,
                            error = %e,
                            "Failed to requeue message"
                        );
                        Outcome::Unsettled
                    }
                }
            }
            Disposition::Reject => self.reject(&delivery, &error.to_string()).await,
        }
    }

    async fn reject(&self, delivery: &Delivery, reason: &str) -> Outcome {
        match self.queue.reject(delivery, reason).await {
            Ok(()) => {
                self.metrics.job_rejected();
                Outcome::Rejected
            }
            Err(e) => {
                error!(
                    stream_id = %delivery.stream_id,
                    error = %e,
                    "Failed to move message to DLQ"
                );
                Outcome::Unsettled
            }
        }
    }
}

async fn wait_backoff(delay: Duration, shutdown: Option<&mut watch::Receiver<bool>>) {
    match shutdown {
        None => tokio::time::sleep(delay).await,
        Some(shutdown) if *shutdown.borrow() => {}
        Some(shutdown) => {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Shutdown requested, re-publishing without waiting for backoff");
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

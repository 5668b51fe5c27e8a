//! Stream Worker Framework
//!
//! A Redis Streams worker for background jobs, one message in flight at a time.
//!
//! ## Features
//!
//! - **Generic worker**: `StreamWorker<J, P, Q>` feeds any job type to a processor
//! - **Consumer groups**: horizontal scaling with Redis consumer groups
//! - **Failure policy**: bounded retry for transient errors, DLQ for the rest
//! - **Prometheus metrics** and **health endpoints** for K8s probes
//! - **In-memory queue** for tests
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{StreamConsumer, StreamDef, StreamWorker, WorkerConfig};
//!
//! let config = WorkerConfig::from_stream_def::<MailStream>();
//! let queue = Arc::new(StreamConsumer::new(redis, config.clone()));
//! let worker = StreamWorker::new(queue, processor, config.failure_policy, &config.stream_name);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod event;
mod health;
pub mod memory;
pub mod metrics;
mod policy;
mod queue;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use consumer::StreamConsumer;
pub use dlq::{DlqEntry, DlqManager, DlqStats};
pub use error::{ErrorCategory, StreamError};
pub use event::{Delivery, JOB_FIELD, RETRY_COUNT_FIELD};
pub use health::{health_router, HealthState};
pub use memory::InMemoryQueue;
pub use metrics::{init_metrics, StreamMetrics};
pub use policy::{Disposition, FailurePolicy};
pub use queue::{MessageQueue, QueueInspector};
pub use registry::{StreamDef, StreamJob, StreamProcessor};
pub use worker::{Outcome, StreamWorker};

//! Prometheus metrics for stream workers

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

use crate::error::ErrorCategory;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder.
///
/// Call this once at startup. Subsequent calls return the existing handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics initialized");
        Ok(handle)
    })
}

pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Per-stream metric helper
#[derive(Clone)]
pub struct StreamMetrics {
    stream_name: String,
    processor_name: String,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            processor_name: processor_name.into(),
        }
    }

    pub fn job_received(&self) {
        counter!(
            "stream_worker_jobs_received_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);
    }

    pub fn job_acked(&self, duration: Duration) {
        self.outcome("acked");
        histogram!(
            "stream_worker_job_duration_seconds",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    pub fn job_failed(&self, category: ErrorCategory) {
        counter!(
            "stream_worker_job_errors_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "category" => category.as_str()
        )
        .increment(1);
    }

    pub fn job_retried(&self) {
        self.outcome("retried");
    }

    pub fn job_rejected(&self) {
        self.outcome("rejected");
    }

    /// Message body could not be parsed into a job
    pub fn parse_failed(&self) {
        counter!(
            "stream_worker_parse_failures_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }

    fn outcome(&self, outcome: &'static str) {
        counter!(
            "stream_worker_jobs_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

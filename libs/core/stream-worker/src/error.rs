//! Stream error types and error categorization
//!
//! Errors are categorized to determine what happens to the message:
//! - **Transient**: temporary failure, eligible for a delayed retry
//! - **Permanent**: retrying cannot help, reject to the DLQ
//! - **RateLimited**: upstream throttling, retried with a longer backoff

use std::time::Duration;
use thiserror::Error;

/// Category of error for determining retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Permanent,
    RateLimited,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorCategory::Permanent)
    }

    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::RateLimited => "rate_limited",
        }
    }

    fn base_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 1000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5000,
        }
    }

    fn max_delay_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 30_000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 120_000,
        }
    }

    /// Exponential backoff before the given retry (0-based)
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let delay = self
            .base_delay_ms()
            .saturating_mul(2u64.saturating_pow(retry_count))
            .min(self.max_delay_ms());
        Duration::from_millis(delay)
    }
}

/// Stream processing errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The message body could not be turned into a job
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The processor failed the job
    #[error("Processing error: {message}")]
    Processing {
        message: String,
        category: ErrorCategory,
    },
}

impl StreamError {
    pub fn transient(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Transient,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::Permanent,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        StreamError::Processing {
            message: message.into(),
            category: ErrorCategory::RateLimited,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::Redis(_) => ErrorCategory::Transient,
            StreamError::Serialization(_) => ErrorCategory::Permanent,
            StreamError::Processing { category, .. } => *category,
        }
    }

    /// The consumer group vanished (stream deleted or flushed)
    pub fn is_nogroup(&self) -> bool {
        matches!(self, StreamError::Redis(e) if e.to_string().contains("NOGROUP"))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Serialization(err.to_string())
    }
}

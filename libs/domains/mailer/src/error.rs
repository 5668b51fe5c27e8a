//! Error types for the mailer domain.
//!
//! Every step of a job has its own error type. [`JobError`] wraps them and
//! decides, through [`JobError::category`], whether the queue should retry the
//! message or move it to the dead letter stream.

use std::path::PathBuf;
use stream_worker::{ErrorCategory, StreamError};
use thiserror::Error;

/// Result type for job processing.
pub type JobResult<T> = Result<T, JobError>;

/// Recipient lookup failures.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No user with this ID.
    #[error("User not found: {0}")]
    NotFound(String),

    /// The user directory could not be queried.
    #[error("User directory error: {0}")]
    Service(String),
}

impl From<sea_orm::DbErr> for LookupError {
    fn from(err: sea_orm::DbErr) -> Self {
        LookupError::Service(err.to_string())
    }
}

/// Subject or body rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Missing translation key '{key}' for language '{language}'")]
    MissingTranslationKey { language: String, key: String },

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Invalid template params: {0}")]
    InvalidTemplateParams(String),
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        RenderError::InvalidTemplateParams(err.to_string())
    }
}

/// Outbound mail failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(String),

    /// The server answered with a permanent (5xx) rejection.
    #[error("SMTP server rejected message: {0}")]
    Rejected(String),

    /// Network, TLS, timeout or temporary (4xx) server failures.
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Resending the same message cannot succeed.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, DispatchError::Transport(_))
    }
}

impl From<lettre::transport::smtp::Error> for DispatchError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_permanent() {
            DispatchError::Rejected(err.to_string())
        } else {
            DispatchError::Transport(err.to_string())
        }
    }
}

/// Token store failures.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Token store error: {0}")]
    Store(String),
}

impl From<redis::RedisError> for PersistError {
    fn from(err: redis::RedisError) -> Self {
        PersistError::Store(err.to_string())
    }
}

/// Translation catalog loading failures, raised at startup only.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid catalog for language '{language}': {source}")]
    Json {
        language: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog for language '{language}' must be a JSON object")]
    NotAnObject { language: String },

    #[error("Fallback language '{0}' has no catalog")]
    MissingFallback(String),
}

/// Errors that fail a mail job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid email type: {0}")]
    UnknownJobType(String),

    /// The job's `data` lacks a field the job type needs.
    #[error("Job data is missing '{0}'")]
    MissingData(&'static str),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl JobError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::UnknownJobType(_)
            | JobError::MissingData(_)
            | JobError::Render(_)
            | JobError::Lookup(LookupError::NotFound(_)) => ErrorCategory::Permanent,
            // The mail has already been sent; redelivery would send it again.
            JobError::Persist(_) => ErrorCategory::Permanent,
            JobError::Lookup(LookupError::Service(_)) => ErrorCategory::Transient,
            JobError::Dispatch(e) if e.is_permanent() => ErrorCategory::Permanent,
            JobError::Dispatch(_) => ErrorCategory::Transient,
        }
    }
}

impl From<JobError> for StreamError {
    fn from(err: JobError) -> Self {
        StreamError::Processing {
            category: err.category(),
            message: err.to_string(),
        }
    }
}

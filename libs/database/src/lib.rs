//! Connection helpers for the stores the mail worker talks to.
//!
//! - `redis` (default): queue transport and token store
//! - `postgres` (default): user directory, through SeaORM
//!
//! Both connectors retry with exponential backoff so a worker started
//! alongside its dependencies (docker compose, k8s) does not crash-loop.
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::redis::{connect_with_retry, RedisConfig};
//!
//! let redis = connect_with_retry(&RedisConfig::from_env()?, None).await?;
//! ```

pub mod retry;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use retry::{retry_with_backoff, RetryConfig};

/// Unified database error type for connector operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sea_orm::DbErr),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_config::ConfigError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

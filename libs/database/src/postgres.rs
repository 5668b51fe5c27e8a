use core_config::{ConfigError, FromEnv, env_parse_or, env_required};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::info;

use crate::retry::{RetryConfig, retry_with_backoff};

/// PostgreSQL pool settings.
///
/// The mail worker only issues single-row lookups, so the pool is small.
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Log every statement through sqlx
    pub sqlx_logging: bool,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 8,
            acquire_timeout_secs: 8,
            idle_timeout_secs: 300,
            sqlx_logging: false,
        }
    }

    pub fn into_connect_options(self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(self.url);
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .sqlx_logging(self.sqlx_logging);
        opt
    }
}

/// Environment variables:
/// - `DATABASE_URL` (required)
/// - `DB_MAX_CONNECTIONS` (default 5)
/// - `DB_MIN_CONNECTIONS` (default 1)
/// - `DB_SQLX_LOGGING` (default false)
impl FromEnv for PostgresConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(env_required("DATABASE_URL")?);

        let config = Self {
            max_connections: env_parse_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_parse_or("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            sqlx_logging: env_parse_or("DB_SQLX_LOGGING", defaults.sqlx_logging)?,
            ..defaults
        };

        if config.min_connections > config.max_connections {
            return Err(ConfigError::InvalidValue {
                key: "DB_MIN_CONNECTIONS".to_string(),
                details: format!(
                    "{} exceeds DB_MAX_CONNECTIONS ({})",
                    config.min_connections, config.max_connections
                ),
            });
        }

        Ok(config)
    }
}

pub async fn connect(config: &PostgresConfig) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(config.clone().into_connect_options()).await?;
    info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(db)
}

/// [`connect`] with exponential backoff; `None` uses [`RetryConfig::default`].
pub async fn connect_with_retry(
    config: &PostgresConfig,
    retry_config: Option<RetryConfig>,
) -> Result<DatabaseConnection, DbErr> {
    retry_with_backoff(|| connect(config), retry_config.unwrap_or_default()).await
}

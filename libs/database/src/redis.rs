use core_config::{ConfigError, FromEnv, env_optional};
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::retry::{RetryConfig, retry_with_backoff};

/// Redis connection settings
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

/// Reads `REDIS_URL`, falling back to `REDIS_HOST`.
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_optional("REDIS_URL")
            .or_else(|| env_optional("REDIS_HOST"))
            .ok_or_else(|| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        Ok(Self { url })
    }
}

/// Open a `ConnectionManager` and verify it with `PING`.
///
/// The manager reconnects on its own after the initial handshake.
pub async fn connect(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    info!(url = %redact(&config.url), "Connecting to Redis");

    let client = Client::open(config.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Connected to Redis");
    Ok(manager)
}

/// [`connect`] with exponential backoff; `None` uses [`RetryConfig::default`].
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: Option<RetryConfig>,
) -> redis::RedisResult<ConnectionManager> {
    retry_with_backoff(|| connect(config), retry_config.unwrap_or_default()).await
}

/// Strip credentials from a connection URL before logging it.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

//! One-time token records for confirmation and password-reset links.
//!
//! A token is written only after its mail was sent. Redelivered jobs write
//! again; the Redis store overwrites the same key.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::PersistError;

pub const CONFIRMATION_PREFIX: &str = "confirm";
pub const RESET_PREFIX: &str = "reset";

/// Which flow a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Confirmation,
    PasswordReset,
}

impl TokenKind {
    pub fn key(&self, path: &str) -> String {
        let prefix = match self {
            TokenKind::Confirmation => CONFIRMATION_PREFIX,
            TokenKind::PasswordReset => RESET_PREFIX,
        };
        format!("{}:{}", prefix, path)
    }
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn add_confirmation_token(&self, path: &str, owner_id: &str) -> Result<(), PersistError>;

    async fn add_reset_password_token(
        &self,
        path: &str,
        owner_id: &str,
    ) -> Result<(), PersistError>;
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub confirmation: Duration,
    pub reset: Duration,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self {
            confirmation: Duration::from_secs(86_400),
            reset: Duration::from_secs(3_600),
        }
    }
}

/// `SET {confirm|reset}:{path} {owner} EX {ttl}`
#[derive(Clone)]
pub struct RedisTokenStore {
    redis: ConnectionManager,
    ttl: TokenTtl,
}

impl RedisTokenStore {
    pub fn new(redis: ConnectionManager, ttl: TokenTtl) -> Self {
        Self { redis, ttl }
    }

    async fn set(
        &self,
        kind: TokenKind,
        path: &str,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<(), PersistError> {
        let key = kind.key(path);
        let mut conn = self.redis.clone();

        redis::cmd("SET")
            .arg(&key)
            .arg(owner_id)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await?;

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Stored token");
        Ok(())
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn add_confirmation_token(&self, path: &str, owner_id: &str) -> Result<(), PersistError> {
        self.set(TokenKind::Confirmation, path, owner_id, self.ttl.confirmation)
            .await
    }

    async fn add_reset_password_token(
        &self,
        path: &str,
        owner_id: &str,
    ) -> Result<(), PersistError> {
        self.set(TokenKind::PasswordReset, path, owner_id, self.ttl.reset)
            .await
    }
}

/// A token written to an [`InMemoryTokenStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub kind: TokenKind,
    pub path: String,
    pub owner_id: String,
}

/// Records tokens in memory, for tests.
#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    records: Arc<Mutex<Vec<TokenRecord>>>,
    failure: Option<String>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub async fn records(&self) -> Vec<TokenRecord> {
        self.records.lock().await.clone()
    }

    async fn push(&self, kind: TokenKind, path: &str, owner_id: &str) -> Result<(), PersistError> {
        if let Some(message) = &self.failure {
            return Err(PersistError::Store(message.clone()));
        }
        self.records.lock().await.push(TokenRecord {
            kind,
            path: path.to_string(),
            owner_id: owner_id.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn add_confirmation_token(&self, path: &str, owner_id: &str) -> Result<(), PersistError> {
        self.push(TokenKind::Confirmation, path, owner_id).await
    }

    async fn add_reset_password_token(
        &self,
        path: &str,
        owner_id: &str,
    ) -> Result<(), PersistError> {
        self.push(TokenKind::PasswordReset, path, owner_id).await
    }
}

/// Writes the token for a mail that has been sent.
#[derive(Clone)]
pub struct TokenRecorder {
    store: Arc<dyn TokenStore>,
}

impl TokenRecorder {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub async fn record_confirmation(
        &self,
        path: &str,
        owner_id: &str,
    ) -> Result<(), PersistError> {
        self.store.add_confirmation_token(path, owner_id).await?;
        info!(owner_id, "Recorded confirmation token");
        Ok(())
    }

    pub async fn record_reset(&self, path: &str, owner_id: &str) -> Result<(), PersistError> {
        self.store.add_reset_password_token(path, owner_id).await?;
        info!(owner_id, "Recorded password reset token");
        Ok(())
    }

    pub async fn record(
        &self,
        kind: TokenKind,
        path: &str,
        owner_id: &str,
    ) -> Result<(), PersistError> {
        match kind {
            TokenKind::Confirmation => self.record_confirmation(path, owner_id).await,
            TokenKind::PasswordReset => self.record_reset(path, owner_id).await,
        }
    }
}

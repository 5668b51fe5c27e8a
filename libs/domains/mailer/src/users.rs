//! Recipient lookup.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::debug;

use crate::error::LookupError;
use crate::models::UserData;

pub const DEFAULT_USERS_TABLE: &str = "users";

/// Source of recipient details.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_data(&self, receiver_id: &str) -> Result<UserData, LookupError>;
}

#[derive(Debug, FromQueryResult)]
struct UserRow {
    email: String,
    username: String,
    language: Option<String>,
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            email: row.email,
            username: row.username,
            language: row.language.filter(|l| !l.trim().is_empty()),
        }
    }
}

/// PostgreSQL user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    db: DatabaseConnection,
    query: String,
}

impl PgUserDirectory {
    /// `table` may be schema-qualified (`auth.users`). Only ASCII letters,
    /// digits, `_` and one `.` are accepted since it is spliced into SQL.
    pub fn new(db: DatabaseConnection, table: &str) -> Result<Self, LookupError> {
        if !is_valid_table_name(table) {
            return Err(LookupError::Service(format!("invalid users table name '{}'", table)));
        }

        // `id::text` so string, integer and UUID keys all match the receiver ID.
        let query = format!(
            "SELECT email, username, language FROM {} WHERE id::text = $1 LIMIT 1",
            table
        );

        Ok(Self { db, query })
    }
}

fn is_valid_table_name(table: &str) -> bool {
    let parts: Vec<&str> = table.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|p| {
            !p.is_empty()
                && !p.starts_with(|c: char| c.is_ascii_digit())
                && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_user_data(&self, receiver_id: &str) -> Result<UserData, LookupError> {
        debug!(receiver_id, "Looking up recipient");

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &self.query,
            [receiver_id.into()],
        );

        UserRow::find_by_statement(stmt)
            .one(&self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| LookupError::NotFound(receiver_id.to_string()))
    }
}

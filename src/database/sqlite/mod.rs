
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use crate::{RagError, Result};

pub type DbPool = Pool<Sqlite>;

/// Persistent conversation history keyed by an opaque conversation id
#[derive(Debug, Clone)]
pub struct SessionDatabase {
    pool: DbPool,
}

/// One turn fragment in a conversation's history
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SessionMessage {
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl SessionDatabase {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| {
                RagError::Session(format!("Failed to create database connection pool: {}", e))
            })?;

        let database = Self { pool };
        database.create_schema().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn create_schema(&self) -> Result<()> {
        info!("Ensuring session database schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::Session(format!("Failed to create messages table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages (conversation_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::Session(format!("Failed to create messages index: {}", e)))?;

        debug!("Session database schema ready");
        Ok(())
    }

    /// Append one message to a conversation's history
    #[inline]
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(role)
        .bind(content)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::Session(format!("Failed to append message: {}", e)))?;

        Ok(())
    }

    /// Ordered history for a conversation, oldest first
    #[inline]
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<SessionMessage>> {
        sqlx::query_as::<_, SessionMessage>(
            "SELECT conversation_id, role, content, created_at
             FROM messages
             WHERE conversation_id = ?
             ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::Session(format!("Failed to load history: {}", e)))
    }

    /// Delete a conversation's history; returns whether any rows existed
    #[inline]
    pub async fn clear(&self, conversation_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::Session(format!("Failed to clear conversation: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Distinct conversation ids with persisted history
    #[inline]
    pub async fn list_conversation_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT conversation_id FROM messages ORDER BY conversation_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RagError::Session(format!("Failed to list conversations: {}", e)))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

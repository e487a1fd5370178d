//! Message Repository Implementation
//!
//! PostgreSQL implementation of the MessageRepository trait.
//! Attachments are not loaded here; see `PgAttachmentRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageRepository, NewMessage};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: i64,
    sender_id: i64,
    recipient_id: i64,
    content: Option<String>,
    parent_id: Option<i64>,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            content: self.content,
            parent_id: self.parent_id,
            read_at: self.read_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            attachments: Vec::new(),
        }
    }
}

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender_id, recipient_id, content, parent_id,
                   read_at, created_at, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (chat_id, sender_id, recipient_id, content, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, chat_id, sender_id, recipient_id, content, parent_id,
                      read_at, created_at, updated_at
            "#,
        )
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.content)
        .bind(message.parent_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn find_by_chat(
        &self,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender_id, recipient_id, content, parent_id,
                   read_at, created_at, updated_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn find_latest_in_chat(&self, chat_id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender_id, recipient_id, content, parent_id,
                   read_at, created_at, updated_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageRow::into_message))
    }

    async fn update_content(&self, id: i64, content: &str) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET content = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, chat_id, sender_id, recipient_id, content, parent_id,
                      read_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }

    async fn mark_read(&self, id: i64) -> Result<Message, AppError> {
        // Re-reading keeps the first read time
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1
            RETURNING id, chat_id, sender_id, recipient_id, content, parent_id,
                      read_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }

        Ok(())
    }
}

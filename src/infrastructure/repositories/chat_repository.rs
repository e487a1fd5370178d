//! Chat Repository Implementation
//!
//! PostgreSQL implementation of the ChatRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Chat, ChatRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    user1_id: i64,
    user2_id: i64,
    last_message_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChatRow {
    fn into_chat(self) -> Chat {
        Chat {
            id: self.id,
            user1_id: self.user1_id,
            user2_id: self.user2_id,
            last_message_id: self.last_message_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL chat repository implementation.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, user1_id, user2_id, last_message_id, created_at, updated_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChatRow::into_chat))
    }

    async fn find_between(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, user1_id, user2_id, last_message_id, created_at, updated_at
            FROM chats
            WHERE (user1_id = $1 AND user2_id = $2) OR (user1_id = $2 AND user2_id = $1)
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ChatRow::into_chat))
    }

    async fn create(&self, user1_id: i64, user2_id: i64) -> Result<Chat, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            INSERT INTO chats (user1_id, user2_id)
            VALUES ($1, $2)
            RETURNING id, user1_id, user2_id, last_message_id, created_at, updated_at
            "#,
        )
        .bind(user1_id)
        .bind(user2_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Chat between these users already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_chat())
    }

    async fn find_for_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Chat>, AppError> {
        let rows = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, user1_id, user2_id, last_message_id, created_at, updated_at
            FROM chats
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY updated_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatRow::into_chat).collect())
    }

    async fn set_last_message(
        &self,
        chat_id: i64,
        message_id: Option<i64>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE chats SET last_message_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

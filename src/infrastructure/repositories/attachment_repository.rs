//! Attachment Repository Implementation
//!
//! PostgreSQL implementation of the AttachmentRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Attachment, AttachmentRepository, NewAttachment};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    message_id: i64,
    file_name: String,
    file_path: String,
    file_type: String,
    file_size: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AttachmentRow> for Attachment {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            message_id: row.message_id,
            file_name: row.file_name,
            file_path: row.file_path,
            file_type: row.file_type,
            file_size: row.file_size,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL attachment repository implementation.
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn create(&self, attachment: &NewAttachment) -> Result<Attachment, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            INSERT INTO attachments (message_id, file_name, file_path, file_type, file_size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, message_id, file_name, file_path, file_type, file_size,
                      created_at, updated_at
            "#,
        )
        .bind(attachment.message_id)
        .bind(&attachment.file_name)
        .bind(&attachment.file_path)
        .bind(&attachment.file_type)
        .bind(attachment.file_size)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_message(&self, message_id: i64) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, message_id, file_name, file_path, file_type, file_size,
                   created_at, updated_at
            FROM attachments
            WHERE message_id = $1
            ORDER BY id
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }

    async fn find_by_path(&self, file_path: &str) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, message_id, file_name, file_path, file_type, file_size,
                   created_at, updated_at
            FROM attachments
            WHERE file_path = $1
            "#,
        )
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Attachment::from))
    }

    async fn find_by_messages(&self, message_ids: &[i64]) -> Result<Vec<Attachment>, AppError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, message_id, file_name, file_path, file_type, file_size,
                   created_at, updated_at
            FROM attachments
            WHERE message_id = ANY($1)
            ORDER BY message_id, id
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Attachment::from).collect())
    }
}

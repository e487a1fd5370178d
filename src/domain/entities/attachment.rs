//! Message Attachment entity and repository trait.
//!
//! Maps to the `attachments` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a file attached to a message.
///
/// Maps to the `attachments` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - message_id: BIGINT NOT NULL REFERENCES messages(id) ON DELETE CASCADE
/// - file_name: VARCHAR(255) NOT NULL (original name as uploaded)
/// - file_path: TEXT NOT NULL (stored name, unique)
/// - file_type: VARCHAR(100) NOT NULL (MIME type)
/// - file_size: BIGINT NOT NULL (bytes)
/// - created_at, updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,

    pub message_id: i64,

    /// Original filename
    pub file_name: String,

    /// Name under which the file is stored
    pub file_path: String,

    /// MIME type (e.g., "image/png", "application/pdf")
    pub file_type: String,

    /// File size in bytes
    pub file_size: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Attachment {
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

/// Fields required to insert an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub message_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Repository trait for Attachment data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn create(&self, attachment: &NewAttachment) -> Result<Attachment, AppError>;

    async fn find_by_message(&self, message_id: i64) -> Result<Vec<Attachment>, AppError>;

    /// Look up an attachment by its stored file name.
    async fn find_by_path(&self, file_path: &str) -> Result<Option<Attachment>, AppError>;

    /// Attachments of several messages in one query.
    async fn find_by_messages(&self, message_ids: &[i64]) -> Result<Vec<Attachment>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image() {
        let now = Utc::now();
        let mut attachment = Attachment {
            id: 1,
            message_id: 1,
            file_name: "cat.png".into(),
            file_path: "0b7c.png".into(),
            file_type: "image/png".into(),
            file_size: 1024,
            created_at: now,
            updated_at: now,
        };
        assert!(attachment.is_image());

        attachment.file_type = "application/pdf".into();
        assert!(!attachment.is_image());
    }
}

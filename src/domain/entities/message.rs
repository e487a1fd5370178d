//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use crate::shared::error::AppError;

/// Default page size for message history.
pub const MESSAGES_LIMIT: i64 = 20;

/// Maximum message content length in characters.
pub const MAX_CONTENT_LENGTH: usize = 5000;

/// Represents a message in a chat.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - chat_id: BIGINT NOT NULL REFERENCES chats(id) ON DELETE CASCADE
/// - sender_id: BIGINT NOT NULL REFERENCES users(id)
/// - recipient_id: BIGINT NOT NULL REFERENCES users(id)
/// - content: TEXT NULL (attachment-only messages have none)
/// - parent_id: BIGINT NULL REFERENCES messages(id) ON DELETE SET NULL
/// - read_at: TIMESTAMPTZ NULL
/// - created_at, updated_at: TIMESTAMPTZ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,

    pub chat_id: i64,

    pub sender_id: i64,

    pub recipient_id: i64,

    pub content: Option<String>,

    /// Message this one replies to
    pub parent_id: Option<i64>,

    /// When the recipient read the message
    pub read_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Loaded separately from the `attachments` table
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Fields required to insert a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    async fn create(&self, message: &NewMessage) -> Result<Message, AppError>;

    /// Newest first.
    async fn find_by_chat(&self, chat_id: i64, limit: i64, offset: i64)
        -> Result<Vec<Message>, AppError>;

    /// The newest message in a chat, if any.
    async fn find_latest_in_chat(&self, chat_id: i64) -> Result<Option<Message>, AppError>;

    async fn update_content(&self, id: i64, content: &str) -> Result<Message, AppError>;

    async fn mark_read(&self, id: i64) -> Result<Message, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_by_default() {
        let now = Utc::now();
        let message = Message {
            id: 1,
            chat_id: 1,
            sender_id: 1,
            recipient_id: 2,
            content: Some("hello".into()),
            parent_id: None,
            read_at: None,
            created_at: now,
            updated_at: now,
            attachments: Vec::new(),
        };

        assert!(!message.is_read());
        assert!(Message {
            read_at: Some(now),
            ..message
        }
        .is_read());
    }
}

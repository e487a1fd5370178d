//! Chat entity and repository trait.
//!
//! Maps to the `chats` table. A chat is always between exactly two users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Default page size when listing chats.
pub const CHATS_LIMIT: i64 = 20;

/// A direct conversation between two users.
///
/// Maps to the `chats` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - user1_id: BIGINT NOT NULL REFERENCES users(id)
/// - user2_id: BIGINT NOT NULL REFERENCES users(id)
/// - last_message_id: BIGINT NULL REFERENCES messages(id) ON DELETE SET NULL
/// - created_at, updated_at: TIMESTAMPTZ
///
/// The pair is unique regardless of order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub last_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: i64) -> Option<i64> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }
}

/// Repository trait for Chat data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Chat>, AppError>;

    /// The chat between two users, in either order.
    async fn find_between(&self, user_a: i64, user_b: i64) -> Result<Option<Chat>, AppError>;

    async fn create(&self, user1_id: i64, user2_id: i64) -> Result<Chat, AppError>;

    /// Chats the user participates in, most recently updated first.
    async fn find_for_user(&self, user_id: i64, limit: i64, offset: i64)
        -> Result<Vec<Chat>, AppError>;

    async fn set_last_message(&self, chat_id: i64, message_id: Option<i64>)
        -> Result<(), AppError>;
}

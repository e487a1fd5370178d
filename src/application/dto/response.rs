//! Response DTOs
//!
//! Data structures for API response bodies and event payloads. All fields are
//! camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Attachment, Chat, Message, User};

/// User response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: String,
    pub last_seen: Option<DateTime<Utc>>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Live presence, filled in where the caller asks for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            last_seen: user.last_seen,
            profile_picture: user.profile_picture,
            created_at: user.created_at,
            updated_at: user.updated_at,
            is_online: None,
        }
    }
}

impl UserResponse {
    pub fn with_online(mut self, is_online: bool) -> Self {
        self.is_online = Some(is_online);
        self
    }
}

/// Attachment response
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResponse {
    pub id: i64,
    pub message_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            id: attachment.id,
            message_id: attachment.message_id,
            file_name: attachment.file_name,
            file_path: attachment.file_path,
            file_type: attachment.file_type,
            file_size: attachment.file_size,
            created_at: attachment.created_at,
            updated_at: attachment.updated_at,
        }
    }
}

/// Message response, also the payload of message events
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attachments: Vec<AttachmentResponse>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            content: message.content,
            parent_id: message.parent_id,
            read_at: message.read_at,
            created_at: message.created_at,
            updated_at: message.updated_at,
            attachments: message
                .attachments
                .into_iter()
                .map(AttachmentResponse::from)
                .collect(),
        }
    }
}

/// Chat response with optional joined participants and last message
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub last_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user1: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user2: Option<UserResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageResponse>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            user1_id: chat.user1_id,
            user2_id: chat.user2_id,
            last_message_id: chat.last_message_id,
            created_at: chat.created_at,
            updated_at: chat.updated_at,
            user1: None,
            user2: None,
            last_message: None,
        }
    }
}

/// Issued access token
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// `GET /api/users/online`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersResponse {
    pub online_users: Vec<i64>,
}

/// `GET /api/users/{id}/online`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPresenceResponse {
    pub user_id: i64,
    pub is_online: bool,
    /// `null` for users that never connected
    pub last_seen: Option<DateTime<Utc>>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_omits_unknown_presence() {
        let user = User {
            id: 1,
            username: "alice".into(),
            phone: "+380501112233".into(),
            ..User::default()
        };

        let plain = serde_json::to_value(UserResponse::from(user.clone())).unwrap();
        assert!(plain.get("isOnline").is_none());
        assert!(plain.get("passwordHash").is_none());

        let annotated = serde_json::to_value(UserResponse::from(user).with_online(true)).unwrap();
        assert_eq!(annotated["isOnline"], true);
        assert_eq!(annotated["firstName"], serde_json::Value::Null);
    }

    #[test]
    fn test_presence_response_never_seen() {
        let value = serde_json::to_value(UserPresenceResponse {
            user_id: 9,
            is_online: false,
            last_seen: None,
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({"userId": 9, "isOnline": false, "lastSeen": null})
        );
    }
}

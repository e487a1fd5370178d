//! Outbound Event Model
//!
//! Every frame written to a live connection is an [`Envelope`]. Message
//! events carry their payload under `message`:
//!
//! ```json
//! {"event":"newMessage","message":{"id":1,"chatId":3,...}}
//! ```
//!
//! Presence transitions are flat:
//!
//! ```json
//! {"event":"statusChange","userId":7,"isOnline":true,"lastSeen":"2024-05-01T10:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::dto::response::MessageResponse;

/// Payload of a `deleteMessage` event.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeletedMessage {
    /// The message as it was before deletion
    pub deleted: MessageResponse,
    /// The chat's new last message, if any remain
    pub last: Option<MessageResponse>,
}

/// Message lifecycle events routed to a single user.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "message", rename_all = "camelCase")]
pub enum Notification {
    NewMessage(MessageResponse),
    EditMessage(MessageResponse),
    DeleteMessage(DeletedMessage),
    /// Read receipt, sent to the original sender
    ReadMessage(MessageResponse),
}

impl Notification {
    /// Wire name of the event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::NewMessage(_) => "newMessage",
            Notification::EditMessage(_) => "editMessage",
            Notification::DeleteMessage(_) => "deleteMessage",
            Notification::ReadMessage(_) => "readMessage",
        }
    }
}

/// Presence transition broadcast to every other connected user.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename = "statusChange", rename_all = "camelCase")]
pub struct StatusChange {
    pub user_id: i64,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

/// A single outbound frame.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Envelope {
    Notification(Notification),
    StatusChange(StatusChange),
}

impl Envelope {
    pub fn event_name(&self) -> &'static str {
        match self {
            Envelope::Notification(n) => n.event_name(),
            Envelope::StatusChange(_) => "statusChange",
        }
    }

    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Notification> for Envelope {
    fn from(notification: Notification) -> Self {
        Envelope::Notification(notification)
    }
}

impl From<StatusChange> for Envelope {
    fn from(change: StatusChange) -> Self {
        Envelope::StatusChange(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn sample_message(id: i64) -> MessageResponse {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        MessageResponse {
            id,
            chat_id: 3,
            sender_id: 1,
            recipient_id: 2,
            content: Some("hi".into()),
            parent_id: None,
            read_at: None,
            created_at: at,
            updated_at: at,
            attachments: Vec::new(),
        }
    }

    fn frame_json(envelope: Envelope) -> Value {
        serde_json::from_str(&envelope.to_frame().unwrap()).unwrap()
    }

    #[test]
    fn test_new_message_wraps_payload_under_message() {
        let value = frame_json(Notification::NewMessage(sample_message(9)).into());

        assert_eq!(value["event"], "newMessage");
        assert_eq!(value["message"]["id"], 9);
        assert_eq!(value["message"]["chatId"], 3);
        assert_eq!(value["message"]["recipientId"], 2);
        assert_eq!(value["message"]["parentId"], Value::Null);
    }

    #[test]
    fn test_event_names_match_wire_tags() {
        let cases = [
            Notification::NewMessage(sample_message(1)),
            Notification::EditMessage(sample_message(1)),
            Notification::ReadMessage(sample_message(1)),
            Notification::DeleteMessage(DeletedMessage {
                deleted: sample_message(1),
                last: None,
            }),
        ];

        for notification in cases {
            let name = notification.event_name();
            let value = frame_json(notification.into());
            assert_eq!(value["event"], name);
        }
    }

    #[test]
    fn test_delete_message_payload_allows_null_last() {
        let value = frame_json(
            Notification::DeleteMessage(DeletedMessage {
                deleted: sample_message(5),
                last: None,
            })
            .into(),
        );

        assert_eq!(value["event"], "deleteMessage");
        assert_eq!(value["message"]["deleted"]["id"], 5);
        assert_eq!(value["message"]["last"], Value::Null);
    }

    #[test]
    fn test_status_change_is_flat() {
        let change = StatusChange {
            user_id: 7,
            is_online: true,
            last_seen: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        };

        let value = frame_json(change.into());

        assert_eq!(
            value,
            json!({
                "event": "statusChange",
                "userId": 7,
                "isOnline": true,
                "lastSeen": "2024-05-01T10:00:00Z"
            })
        );
    }
}

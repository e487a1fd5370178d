//! Message Service
//!
//! Sending, editing, deleting and reading messages. Every change is persisted
//! first and then routed to the other participant through the [`Notifier`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::application::dto::response::MessageResponse;
use crate::domain::{
    Attachment, AttachmentRepository, Chat, ChatRepository, Message, MessageRepository,
    NewAttachment, NewMessage, UserRepository, MAX_CONTENT_LENGTH,
};
use crate::infrastructure::storage::Storage;
use crate::presentation::websocket::{DeletedMessage, Notification, Notifier};
use crate::shared::error::AppError;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Send a message, opening the chat if it does not exist yet
    async fn send(&self, sender_id: i64, request: SendMessageDto)
        -> Result<MessageResponse, MessageError>;

    /// Chat history, newest first
    async fn history(
        &self,
        user_id: i64,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageResponse>, MessageError>;

    async fn edit(&self, user_id: i64, message_id: i64, content: &str)
        -> Result<MessageResponse, MessageError>;

    async fn delete(&self, user_id: i64, message_id: i64) -> Result<(), MessageError>;

    /// Record that the recipient read the message
    async fn mark_read(&self, user_id: i64, message_id: i64)
        -> Result<MessageResponse, MessageError>;

    /// Stored attachment bytes, for participants of the owning chat only
    async fn download_attachment(
        &self,
        user_id: i64,
        file_path: &str,
    ) -> Result<(Attachment, Vec<u8>), MessageError>;
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct UploadDto {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Send message request
#[derive(Debug, Clone, Default)]
pub struct SendMessageDto {
    pub chat_id: i64,
    pub recipient_id: i64,
    pub content: Option<String>,
    pub parent_id: Option<i64>,
    pub attachments: Vec<UploadDto>,
}

/// Message errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message must have content or attachments")]
    Empty,

    #[error("Content is too long")]
    ContentTooLong,

    #[error("Cannot send a message to yourself")]
    SelfMessage,

    #[error("Recipient does not exist")]
    UnknownRecipient,

    #[error("Recipient is not a participant of this chat")]
    RecipientNotInChat,

    #[error("Parent message does not exist")]
    UnknownParent,

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Message not found")]
    NotFound,

    #[error("Attachment not found")]
    AttachmentNotFound,

    #[error("Not a participant of this chat")]
    NotParticipant,

    #[error("Only the sender can change this message")]
    NotSender,

    #[error("Sender cannot mark own message as read")]
    SenderRead,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MessageError> for AppError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::Empty => AppError::field("content", "is required"),
            MessageError::ContentTooLong => AppError::field("content", "is too long"),
            MessageError::UnknownRecipient => AppError::field("recipientId", "does not exist"),
            MessageError::UnknownParent => AppError::field("parentId", "does not exist"),
            MessageError::SelfMessage
            | MessageError::RecipientNotInChat
            | MessageError::SenderRead => AppError::BadRequest(err.to_string()),
            MessageError::ChatNotFound
            | MessageError::NotFound
            | MessageError::AttachmentNotFound => AppError::NotFound(err.to_string()),
            MessageError::NotParticipant | MessageError::NotSender => {
                AppError::Forbidden(err.to_string())
            }
            MessageError::Store(e) => e,
        }
    }
}

fn check_content(content: &str) -> Result<(), MessageError> {
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(MessageError::ContentTooLong);
    }
    Ok(())
}

/// MessageService implementation
pub struct MessageServiceImpl<M, C, U, A>
where
    M: MessageRepository,
    C: ChatRepository,
    U: UserRepository,
    A: AttachmentRepository,
{
    message_repo: Arc<M>,
    chat_repo: Arc<C>,
    user_repo: Arc<U>,
    attachment_repo: Arc<A>,
    storage: Arc<dyn Storage>,
    notifier: Notifier,
}

impl<M, C, U, A> MessageServiceImpl<M, C, U, A>
where
    M: MessageRepository,
    C: ChatRepository,
    U: UserRepository,
    A: AttachmentRepository,
{
    pub fn new(
        message_repo: Arc<M>,
        chat_repo: Arc<C>,
        user_repo: Arc<U>,
        attachment_repo: Arc<A>,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
    ) -> Self {
        Self {
            message_repo,
            chat_repo,
            user_repo,
            attachment_repo,
            storage,
            notifier,
        }
    }

    async fn find_message(&self, message_id: i64) -> Result<Message, MessageError> {
        let mut message = self
            .message_repo
            .find_by_id(message_id)
            .await?
            .ok_or(MessageError::NotFound)?;

        message.attachments = self.attachment_repo.find_by_message(message.id).await?;
        Ok(message)
    }

    /// The chat the message goes to. An unknown id falls back to the pair's chat.
    async fn resolve_chat(
        &self,
        chat_id: i64,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Chat, MessageError> {
        if let Some(chat) = self.chat_repo.find_by_id(chat_id).await? {
            if !chat.has_participant(sender_id) {
                return Err(MessageError::NotParticipant);
            }
            if chat.other_participant(sender_id) != Some(recipient_id) {
                return Err(MessageError::RecipientNotInChat);
            }
            return Ok(chat);
        }

        match self.chat_repo.find_between(sender_id, recipient_id).await? {
            Some(chat) => Ok(chat),
            None => {
                let chat = self.chat_repo.create(sender_id, recipient_id).await?;
                info!(chat_id = chat.id, "Chat opened by first message");
                Ok(chat)
            }
        }
    }

    async fn store_uploads(
        &self,
        message_id: i64,
        uploads: Vec<UploadDto>,
    ) -> Result<Vec<Attachment>, MessageError> {
        let mut attachments = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let stored = self.storage.save(&upload.file_name, &upload.bytes).await?;
            let attachment = self
                .attachment_repo
                .create(&NewAttachment {
                    message_id,
                    file_name: upload.file_name,
                    file_path: stored.file_path,
                    file_type: upload.content_type,
                    file_size: stored.file_size,
                })
                .await?;
            attachments.push(attachment);
        }

        Ok(attachments)
    }
}

#[async_trait]
impl<M, C, U, A> MessageService for MessageServiceImpl<M, C, U, A>
where
    M: MessageRepository + 'static,
    C: ChatRepository + 'static,
    U: UserRepository + 'static,
    A: AttachmentRepository + 'static,
{
    #[tracing::instrument(skip(self, request), fields(chat_id = request.chat_id, recipient_id = request.recipient_id))]
    async fn send(
        &self,
        sender_id: i64,
        request: SendMessageDto,
    ) -> Result<MessageResponse, MessageError> {
        let content = request
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if content.is_none() && request.attachments.is_empty() {
            return Err(MessageError::Empty);
        }
        if let Some(content) = &content {
            check_content(content)?;
        }

        if sender_id == request.recipient_id {
            return Err(MessageError::SelfMessage);
        }

        if self.user_repo.find_by_id(request.recipient_id).await?.is_none() {
            return Err(MessageError::UnknownRecipient);
        }

        let chat = self
            .resolve_chat(request.chat_id, sender_id, request.recipient_id)
            .await?;

        if let Some(parent_id) = request.parent_id {
            let parent = self.message_repo.find_by_id(parent_id).await?;
            if parent.map(|p| p.chat_id) != Some(chat.id) {
                return Err(MessageError::UnknownParent);
            }
        }

        let mut message = self
            .message_repo
            .create(&NewMessage {
                chat_id: chat.id,
                sender_id,
                recipient_id: request.recipient_id,
                content,
                parent_id: request.parent_id,
            })
            .await?;

        message.attachments = self.store_uploads(message.id, request.attachments).await?;
        self.chat_repo
            .set_last_message(chat.id, Some(message.id))
            .await?;

        let response = MessageResponse::from(message);
        self.notifier
            .send(response.recipient_id, Notification::NewMessage(response.clone()));

        info!(message_id = response.id, "Message sent");
        Ok(response)
    }

    async fn history(
        &self,
        user_id: i64,
        chat_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageResponse>, MessageError> {
        let chat = self
            .chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or(MessageError::ChatNotFound)?;

        if !chat.has_participant(user_id) {
            return Err(MessageError::NotParticipant);
        }

        let messages = self.message_repo.find_by_chat(chat_id, limit, offset).await?;
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();

        let mut by_message: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in self.attachment_repo.find_by_messages(&ids).await? {
            by_message
                .entry(attachment.message_id)
                .or_default()
                .push(attachment);
        }

        Ok(messages
            .into_iter()
            .map(|mut message| {
                message.attachments = by_message.remove(&message.id).unwrap_or_default();
                MessageResponse::from(message)
            })
            .collect())
    }

    #[tracing::instrument(skip(self, content))]
    async fn edit(
        &self,
        user_id: i64,
        message_id: i64,
        content: &str,
    ) -> Result<MessageResponse, MessageError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MessageError::Empty);
        }
        check_content(content)?;

        let message = self.find_message(message_id).await?;
        if message.sender_id != user_id {
            return Err(MessageError::NotSender);
        }

        let mut updated = self.message_repo.update_content(message_id, content).await?;
        updated.attachments = message.attachments;

        let response = MessageResponse::from(updated);
        self.notifier
            .send(response.recipient_id, Notification::EditMessage(response.clone()));

        Ok(response)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, user_id: i64, message_id: i64) -> Result<(), MessageError> {
        let message = self.find_message(message_id).await?;
        if message.sender_id != user_id {
            return Err(MessageError::NotSender);
        }

        self.message_repo.delete(message_id).await?;

        for attachment in &message.attachments {
            if let Err(e) = self.storage.delete(&attachment.file_path).await {
                warn!(file = %attachment.file_path, error = %e, "Failed to delete attachment file");
            }
        }

        let last = match self.message_repo.find_latest_in_chat(message.chat_id).await? {
            Some(mut latest) => {
                latest.attachments = self.attachment_repo.find_by_message(latest.id).await?;
                Some(latest)
            }
            None => None,
        };

        self.chat_repo
            .set_last_message(message.chat_id, last.as_ref().map(|m| m.id))
            .await?;

        let recipient_id = message.recipient_id;
        self.notifier.send(
            recipient_id,
            Notification::DeleteMessage(DeletedMessage {
                deleted: message.into(),
                last: last.map(MessageResponse::from),
            }),
        );

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn mark_read(
        &self,
        user_id: i64,
        message_id: i64,
    ) -> Result<MessageResponse, MessageError> {
        let message = self.find_message(message_id).await?;

        if message.sender_id == user_id {
            return Err(MessageError::SenderRead);
        }
        if message.recipient_id != user_id {
            return Err(MessageError::NotParticipant);
        }

        let mut read = self.message_repo.mark_read(message_id).await?;
        read.attachments = message.attachments;

        let response = MessageResponse::from(read);
        self.notifier
            .send(response.sender_id, Notification::ReadMessage(response.clone()));

        Ok(response)
    }

    async fn download_attachment(
        &self,
        user_id: i64,
        file_path: &str,
    ) -> Result<(Attachment, Vec<u8>), MessageError> {
        let attachment = self
            .attachment_repo
            .find_by_path(file_path)
            .await?
            .ok_or(MessageError::AttachmentNotFound)?;

        let message = self
            .message_repo
            .find_by_id(attachment.message_id)
            .await?
            .ok_or(MessageError::AttachmentNotFound)?;

        if message.sender_id != user_id && message.recipient_id != user_id {
            return Err(MessageError::NotParticipant);
        }

        let bytes = self
            .storage
            .read(&attachment.file_path)
            .await?
            .ok_or(MessageError::AttachmentNotFound)?;

        Ok((attachment, bytes))
    }
}

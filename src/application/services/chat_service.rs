//! Chat Service
//!
//! One-to-one conversations. Responses embed both participants (with live
//! presence) and the last message.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::dto::response::{ChatResponse, MessageResponse, UserResponse};
use crate::domain::{Chat, ChatRepository, MessageRepository, User, UserRepository};
use crate::presentation::websocket::PresenceRegistry;
use crate::shared::error::AppError;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open a chat with another user. An existing chat between the pair is returned as is.
    async fn create(&self, user_id: i64, other_id: i64) -> Result<ChatResponse, ChatError>;

    async fn list(&self, user_id: i64, limit: i64, offset: i64)
        -> Result<Vec<ChatResponse>, ChatError>;

    async fn get(&self, user_id: i64, chat_id: i64) -> Result<ChatResponse, ChatError>;
}

/// Chat errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Cannot start a chat with yourself")]
    SelfChat,

    #[error("User does not exist")]
    UnknownUser,

    #[error("Chat not found")]
    NotFound,

    #[error("Chats not found")]
    NoChats,

    #[error("Not a participant of this chat")]
    NotParticipant,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::SelfChat => AppError::BadRequest(err.to_string()),
            ChatError::UnknownUser => AppError::field("userId", "does not exist"),
            ChatError::NotFound | ChatError::NoChats => AppError::NotFound(err.to_string()),
            ChatError::NotParticipant => AppError::Forbidden(err.to_string()),
            ChatError::Store(e) => e,
        }
    }
}

/// ChatService implementation
pub struct ChatServiceImpl<C, U, M>
where
    C: ChatRepository,
    U: UserRepository,
    M: MessageRepository,
{
    chat_repo: Arc<C>,
    user_repo: Arc<U>,
    message_repo: Arc<M>,
    registry: Arc<PresenceRegistry>,
}

impl<C, U, M> ChatServiceImpl<C, U, M>
where
    C: ChatRepository,
    U: UserRepository,
    M: MessageRepository,
{
    pub fn new(
        chat_repo: Arc<C>,
        user_repo: Arc<U>,
        message_repo: Arc<M>,
        registry: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            chat_repo,
            user_repo,
            message_repo,
            registry,
        }
    }

    fn annotate(&self, user: User) -> UserResponse {
        let online = self.registry.is_online(user.id);
        UserResponse::from(user).with_online(online)
    }

    /// Join participants and last messages onto a batch of chats.
    async fn assemble(&self, chats: Vec<Chat>) -> Result<Vec<ChatResponse>, ChatError> {
        let mut ids: Vec<i64> = chats
            .iter()
            .flat_map(|chat| [chat.user1_id, chat.user2_id])
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let users: HashMap<i64, User> = self
            .user_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut responses = Vec::with_capacity(chats.len());
        for chat in chats {
            let last_message = match chat.last_message_id {
                Some(id) => self
                    .message_repo
                    .find_by_id(id)
                    .await?
                    .map(MessageResponse::from),
                None => None,
            };

            let user1 = users.get(&chat.user1_id).cloned().map(|u| self.annotate(u));
            let user2 = users.get(&chat.user2_id).cloned().map(|u| self.annotate(u));

            responses.push(ChatResponse {
                user1,
                user2,
                last_message,
                ..ChatResponse::from(chat)
            });
        }

        Ok(responses)
    }

    async fn assemble_one(&self, chat: Chat) -> Result<ChatResponse, ChatError> {
        self.assemble(vec![chat])
            .await?
            .pop()
            .ok_or(ChatError::NotFound)
    }
}

#[async_trait]
impl<C, U, M> ChatService for ChatServiceImpl<C, U, M>
where
    C: ChatRepository + 'static,
    U: UserRepository + 'static,
    M: MessageRepository + 'static,
{
    #[tracing::instrument(skip(self))]
    async fn create(&self, user_id: i64, other_id: i64) -> Result<ChatResponse, ChatError> {
        if user_id == other_id {
            return Err(ChatError::SelfChat);
        }

        if self.user_repo.find_by_id(other_id).await?.is_none() {
            return Err(ChatError::UnknownUser);
        }

        let chat = match self.chat_repo.find_between(user_id, other_id).await? {
            Some(existing) => existing,
            None => {
                let chat = self.chat_repo.create(user_id, other_id).await?;
                tracing::info!(chat_id = chat.id, "Chat created");
                chat
            }
        };

        self.assemble_one(chat).await
    }

    async fn list(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatResponse>, ChatError> {
        let chats = self.chat_repo.find_for_user(user_id, limit, offset).await?;
        if chats.is_empty() {
            return Err(ChatError::NoChats);
        }

        self.assemble(chats).await
    }

    async fn get(&self, user_id: i64, chat_id: i64) -> Result<ChatResponse, ChatError> {
        let chat = self
            .chat_repo
            .find_by_id(chat_id)
            .await?
            .ok_or(ChatError::NotFound)?;

        if !chat.has_participant(user_id) {
            return Err(ChatError::NotParticipant);
        }

        self.assemble_one(chat).await
    }
}

//! # Domain Entities
//!
//! Core domain entities of the messenger. All persisted entities map directly
//! to their corresponding database tables.
//!
//! - **User**: account with phone-based authentication and profile
//! - **Chat**: a direct conversation between exactly two users
//! - **Message**: a text and/or attachment message within a chat
//! - **Attachment**: a stored file belonging to a message
//! - **Session**: issued tokens and verification codes kept in the token store
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod attachment;
mod chat;
mod message;
mod session;
mod user;

pub use attachment::{Attachment, AttachmentRepository, NewAttachment};
pub use chat::{Chat, ChatRepository, CHATS_LIMIT};
pub use message::{Message, MessageRepository, NewMessage, MAX_CONTENT_LENGTH, MESSAGES_LIMIT};
pub use session::{token_fingerprint, TokenStore};
pub use user::{NewUser, User, UserRepository};

#[cfg(test)]
pub use attachment::MockAttachmentRepository;
#[cfg(test)]
pub use chat::MockChatRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use session::MockTokenStore;
#[cfg(test)]
pub use user::MockUserRepository;

//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, phone verification, JWT sessions
//! - **UserService**: User search and profile updates
//! - **ChatService**: One-to-one chats
//! - **MessageService**: Message lifecycle and attachments

pub mod auth_service;
pub mod chat_service;
pub mod message_service;
pub mod user_service;

// Re-export auth service types
pub use auth_service::{
    AuthError, AuthService, AuthServiceImpl, Claims, CodeSender, JwtKeys, SessionVerifier,
    TokenVerifier,
};

// Re-export chat service types
pub use chat_service::{ChatError, ChatService, ChatServiceImpl};

// Re-export message service types
pub use message_service::{
    MessageError, MessageService, MessageServiceImpl, SendMessageDto, UploadDto,
};

// Re-export user service types
pub use user_service::{
    picture_content_type, UserError, UserService, UserServiceImpl, MAX_PICTURE_BYTES,
};

#[cfg(test)]
pub use auth_service::MockSessionVerifier;

//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use messenger_server::infrastructure::repositories::{
//!     PgChatRepository, PgMessageRepository, PgUserRepository,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let user_repo = PgUserRepository::new(pool.clone());
//!     let chat_repo = PgChatRepository::new(pool.clone());
//!     let message_repo = PgMessageRepository::new(pool.clone());
//! }
//! ```

pub mod attachment_repository;
pub mod chat_repository;
pub mod message_repository;
pub mod user_repository;

pub use attachment_repository::PgAttachmentRepository;
pub use chat_repository::PgChatRepository;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;

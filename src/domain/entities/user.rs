//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - username: VARCHAR(50) NOT NULL UNIQUE
/// - first_name: VARCHAR(50) NULL
/// - last_name: VARCHAR(80) NULL
/// - phone: VARCHAR(20) NOT NULL UNIQUE
/// - password_hash: VARCHAR(255) NOT NULL
/// - last_seen: TIMESTAMPTZ NULL
/// - profile_picture: TEXT NULL
/// - phone_verified_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Username (3-50 characters, unique)
    pub username: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    /// Phone number in international format (unique)
    pub phone: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub last_seen: Option<DateTime<Utc>>,

    /// Stored file name of the profile picture
    pub profile_picture: Option<String>,

    /// Set once the phone number has been confirmed with a verification code
    pub phone_verified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_phone_verified(&self) -> bool {
        self.phone_verified_at.is_some()
    }
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: String::new(),
            first_name: None,
            last_name: None,
            phone: String::new(),
            password_hash: String::new(),
            last_seen: None,
            profile_picture: None,
            phone_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields required to insert a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub phone: String,
    pub password_hash: String,
}

/// Repository trait for User data access operations.
///
/// Implementations of this trait handle the actual database interactions.
/// The trait is defined in the domain layer to maintain dependency inversion.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Fetch several users at once. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AppError>;

    /// Case-insensitive match on username or phone.
    async fn search(&self, query: &str) -> Result<Vec<User>, AppError>;

    async fn create(&self, user: &NewUser) -> Result<User, AppError>;

    async fn phone_exists(&self, phone: &str) -> Result<bool, AppError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AppError>;

    /// Stamp `phone_verified_at` with the current time.
    async fn mark_phone_verified(&self, id: i64) -> Result<(), AppError>;

    async fn update_personal_info(
        &self,
        id: i64,
        first_name: &str,
        last_name: Option<String>,
    ) -> Result<User, AppError>;

    /// Stamp `last_seen` with the current time.
    async fn update_last_seen(&self, id: i64) -> Result<(), AppError>;

    /// Set or clear the stored profile picture name.
    async fn update_profile_picture(
        &self,
        id: i64,
        profile_picture: Option<String>,
    ) -> Result<User, AppError>;
}

//! Issued sessions and verification codes.
//!
//! A session is a signed access token that is also recorded in the token
//! store. Removing the record revokes the token even before it expires.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::shared::error::AppError;

/// Fingerprint of a token used as its storage key.
///
/// Raw tokens are never written to the store.
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Storage of live sessions and pending phone verification codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Record an issued token for `ttl_secs` seconds.
    async fn store_token(&self, user_id: i64, token: &str, ttl_secs: u64) -> Result<(), AppError>;

    async fn token_exists(&self, user_id: i64, token: &str) -> Result<bool, AppError>;

    async fn revoke_token(&self, user_id: i64, token: &str) -> Result<(), AppError>;

    async fn store_verification_code(
        &self,
        phone: &str,
        code: &str,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    async fn verification_code(&self, phone: &str) -> Result<Option<String>, AppError>;

    async fn delete_verification_code(&self, phone: &str) -> Result<(), AppError>;
}

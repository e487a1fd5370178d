//! Redis Token Store
//!
//! Sessions are stored as `user:{id}:token:{sha256(token)}` with the token's
//! lifetime as TTL. Verification codes live under `verification:{phone}`.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::keys;
use crate::domain::{token_fingerprint, TokenStore};
use crate::shared::error::AppError;

/// Token store backed by Redis.
#[derive(Clone)]
pub struct RedisTokenStore {
    redis: ConnectionManager,
}

impl RedisTokenStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn store_token(&self, user_id: i64, token: &str, ttl_secs: u64) -> Result<(), AppError> {
        let key = keys::session(user_id, &token_fingerprint(token));

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, "valid", ttl_secs).await?;

        Ok(())
    }

    async fn token_exists(&self, user_id: i64, token: &str) -> Result<bool, AppError> {
        let key = keys::session(user_id, &token_fingerprint(token));

        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(&key).await?;

        Ok(exists)
    }

    async fn revoke_token(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        let key = keys::session(user_id, &token_fingerprint(token));

        let mut conn = self.redis.clone();
        conn.del::<_, ()>(&key).await?;

        Ok(())
    }

    async fn store_verification_code(
        &self,
        phone: &str,
        code: &str,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(keys::verification(phone), code, ttl_secs)
            .await?;

        Ok(())
    }

    async fn verification_code(&self, phone: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.clone();
        let code: Option<String> = conn.get(keys::verification(phone)).await?;

        Ok(code)
    }

    async fn delete_verification_code(&self, phone: &str) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(keys::verification(phone)).await?;

        Ok(())
    }
}

//! Cache Module
//!
//! Redis connection management and the Redis-backed token store.

mod token_store;

pub use token_store::RedisTokenStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Example
/// ```rust,ignore
/// let settings = RedisSettings { url: "redis://localhost:6379".into() };
/// let conn = create_redis_client(&settings).await?;
/// ```
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Key layout used in Redis.
pub mod keys {
    /// Prefix for pending phone verification codes (e.g., "verification:+380...")
    pub const VERIFICATION: &str = "verification:";

    /// Session key: `user:{user_id}:token:{fingerprint}`
    #[inline]
    pub fn session(user_id: i64, fingerprint: &str) -> String {
        format!("user:{}:token:{}", user_id, fingerprint)
    }

    /// Verification code key for a phone number
    #[inline]
    pub fn verification(phone: &str) -> String {
        format!("{}{}", VERIFICATION, phone)
    }
}

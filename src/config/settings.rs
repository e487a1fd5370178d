//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (token store)
    pub redis: RedisSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Phone verification code settings
    pub verification: VerificationSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Live connection configuration
    pub websocket: WebSocketSettings,

    /// Notification dispatch queue configuration
    pub notifier: NotifierSettings,

    /// Attachment storage configuration
    pub storage: StorageSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Token lifetime in hours. Also the TTL of the token store entry.
    pub token_expiry_hours: i64,
}

/// Phone verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationSettings {
    /// Number of digits in a verification code
    pub code_length: usize,

    /// Code lifetime in minutes
    pub code_expiry_minutes: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Live connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum inbound frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Outbound frames buffered per connection before new ones are dropped
    pub send_queue_capacity: usize,

    /// Upper bound for a single socket write in milliseconds
    pub write_timeout_ms: u64,

    /// Interval between server pings in milliseconds
    pub ping_interval_ms: u64,

    /// Connection is closed when nothing is received for this long
    pub idle_timeout_secs: u64,
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSettings {
    /// Pending notifications held before new ones are dropped
    pub queue_capacity: usize,

    /// How long shutdown waits for the queue to drain, in seconds
    pub drain_timeout_secs: u64,
}

/// Attachment storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory for stored files
    pub root: String,

    /// Maximum multipart request size in megabytes
    pub max_upload_mb: usize,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("jwt.token_expiry_hours", 24)?
            .set_default("verification.code_length", 6)?
            .set_default("verification.code_expiry_minutes", 5)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("websocket.max_message_size", 65536_i64)? // 64KB
            .set_default("websocket.max_frame_size", 16384_i64)? // 16KB
            .set_default("websocket.send_queue_capacity", 64_i64)?
            .set_default("websocket.write_timeout_ms", 5000_i64)?
            .set_default("websocket.ping_interval_ms", 30000_i64)?
            .set_default("websocket.idle_timeout_secs", 90_i64)?
            .set_default("notifier.queue_capacity", 1024_i64)?
            .set_default("notifier.drain_timeout_secs", 5_i64)?
            .set_default("storage.root", "storage")?
            .set_default("storage.max_upload_mb", 200_i64)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=8080 -> server.port = 8080
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("storage.root", std::env::var("STORAGE_ROOT").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.notifier.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "notifier.queue_capacity must be positive".into(),
            ));
        }
        self.websocket.validate()
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebSocketSettings {
    /// Every live connection relies on these being non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = [
            ("send_queue_capacity", self.send_queue_capacity == 0),
            ("write_timeout_ms", self.write_timeout_ms == 0),
            ("ping_interval_ms", self.ping_interval_ms == 0),
            ("idle_timeout_secs", self.idle_timeout_secs == 0),
        ];

        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ConfigError::Message(format!(
                "websocket.{} must be positive",
                name
            ))),
            None => Ok(()),
        }
    }

    pub fn write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_timeout_ms)
    }

    pub fn ping_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval_ms)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            max_message_size: 65536,
            max_frame_size: 16384,
            send_queue_capacity: 64,
            write_timeout_ms: 5000,
            ping_interval_ms: 30000,
            idle_timeout_secs: 90,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_durations() {
        let ws = WebSocketSettings {
            write_timeout_ms: 250,
            ping_interval_ms: 1500,
            idle_timeout_secs: 3,
            ..WebSocketSettings::default()
        };

        assert_eq!(ws.write_timeout().as_millis(), 250);
        assert_eq!(ws.ping_interval().as_millis(), 1500);
        assert_eq!(ws.idle_timeout().as_secs(), 3);
    }

    #[test]
    fn test_default_websocket_settings_are_valid() {
        assert!(WebSocketSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_websocket_timings_are_rejected() {
        let cases = [
            WebSocketSettings { ping_interval_ms: 0, ..WebSocketSettings::default() },
            WebSocketSettings { idle_timeout_secs: 0, ..WebSocketSettings::default() },
            WebSocketSettings { write_timeout_ms: 0, ..WebSocketSettings::default() },
            WebSocketSettings { send_queue_capacity: 0, ..WebSocketSettings::default() },
        ];

        for ws in cases {
            let err = ws.validate().unwrap_err().to_string();
            assert!(err.contains("must be positive"), "{}", err);
        }
    }
}

//! Authentication Service
//!
//! Handles registration with phone verification, JWT issuance and revocable
//! sessions kept in the token store.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::application::dto::response::{TokenResponse, UserResponse};
use crate::config::{JwtSettings, VerificationSettings};
use crate::domain::{NewUser, TokenStore, UserRepository};
use crate::shared::error::AppError;

/// Resolves a bearer credential to the user it was issued for.
///
/// Used by the HTTP middleware and the websocket upgrade.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<i64, AuthError>;
}

/// Delivers verification codes to a phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send_code(&self, phone: &str, code: &str) -> Result<(), AppError>;
}

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create an unverified account and send it a verification code
    async fn register(
        &self,
        username: &str,
        phone: &str,
        password: &str,
    ) -> Result<UserResponse, AuthError>;

    async fn verify_phone(&self, phone: &str, code: &str) -> Result<(), AuthError>;

    async fn resend_code(&self, phone: &str) -> Result<(), AuthError>;

    async fn login(&self, phone: &str, password: &str) -> Result<TokenResponse, AuthError>;

    /// Exchange a live token for a new one, revoking the old
    async fn refresh(&self, token: &str) -> Result<TokenResponse, AuthError>;

    async fn logout(&self, user_id: i64, token: &str) -> Result<(), AuthError>;
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// Makes every issued token distinct
    pub jti: String,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Phone number is not verified")]
    PhoneNotVerified,

    #[error("Phone number is already verified")]
    AlreadyVerified,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session revoked")]
    SessionRevoked,

    #[error("User not found")]
    UserNotFound,

    #[error("Phone already exists")]
    PhoneExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::SessionRevoked => AppError::Unauthorized(err.to_string()),
            AuthError::PhoneNotVerified => AppError::Forbidden(err.to_string()),
            AuthError::AlreadyVerified | AuthError::InvalidCode => {
                AppError::BadRequest(err.to_string())
            }
            AuthError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthError::PhoneExists => AppError::field("phone", "already taken"),
            AuthError::UsernameExists => AppError::field("username", "already taken"),
            AuthError::Internal(msg) => AppError::Internal(msg),
            AuthError::Store(e) => e,
        }
    }
}

/// HS256 signing and verification of access tokens.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl JwtKeys {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            expiry: Duration::hours(settings.token_expiry_hours),
        }
    }

    /// Seconds a token stays valid; also its TTL in the token store.
    pub fn ttl_secs(&self) -> u64 {
        self.expiry.num_seconds().max(0) as u64
    }

    pub fn issue(&self, user_id: i64) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires = now + self.expiry;

        let claims = Claims {
            user_id,
            exp: expires.timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        Ok((token, expires))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }
}

/// Checks the signature and that the session was not revoked.
pub struct TokenVerifier {
    keys: JwtKeys,
    store: Arc<dyn TokenStore>,
}

impl TokenVerifier {
    pub fn new(keys: JwtKeys, store: Arc<dyn TokenStore>) -> Self {
        Self { keys, store }
    }
}

#[async_trait]
impl SessionVerifier for TokenVerifier {
    async fn verify(&self, token: &str) -> Result<i64, AuthError> {
        let claims = self.keys.decode(token)?;

        if !self.store.token_exists(claims.user_id, token).await? {
            return Err(AuthError::SessionRevoked);
        }

        Ok(claims.user_id)
    }
}

/// Generate a numeric verification code of `length` digits.
fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// AuthService implementation
pub struct AuthServiceImpl<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    tokens: Arc<dyn TokenStore>,
    codes: Arc<dyn CodeSender>,
    keys: JwtKeys,
    verification: VerificationSettings,
}

impl<U> AuthServiceImpl<U>
where
    U: UserRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        tokens: Arc<dyn TokenStore>,
        codes: Arc<dyn CodeSender>,
        keys: JwtKeys,
        verification: VerificationSettings,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            codes,
            keys,
            verification,
        }
    }

    /// Hash a password using Argon2id
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    async fn issue_code(&self, phone: &str) -> Result<(), AuthError> {
        let code = generate_code(self.verification.code_length);
        let ttl = self.verification.code_expiry_minutes * 60;

        self.tokens.store_verification_code(phone, &code, ttl).await?;
        self.codes.send_code(phone, &code).await?;

        Ok(())
    }

    async fn issue_session(&self, user_id: i64) -> Result<TokenResponse, AuthError> {
        let (token, expires) = self.keys.issue(user_id)?;
        self.tokens
            .store_token(user_id, &token, self.keys.ttl_secs())
            .await?;

        Ok(TokenResponse { token, expires })
    }
}

#[async_trait]
impl<U> AuthService for AuthServiceImpl<U>
where
    U: UserRepository + 'static,
{
    #[tracing::instrument(skip(self, password))]
    async fn register(
        &self,
        username: &str,
        phone: &str,
        password: &str,
    ) -> Result<UserResponse, AuthError> {
        if self.user_repo.phone_exists(phone).await? {
            return Err(AuthError::PhoneExists);
        }

        if self.user_repo.username_exists(username).await? {
            return Err(AuthError::UsernameExists);
        }

        let password_hash = self.hash_password(password)?;

        let user = self
            .user_repo
            .create(&NewUser {
                username: username.to_string(),
                phone: phone.to_string(),
                password_hash,
            })
            .await?;

        self.issue_code(&user.phone).await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user.into())
    }

    #[tracing::instrument(skip(self, code))]
    async fn verify_phone(&self, phone: &str, code: &str) -> Result<(), AuthError> {
        let stored = self.tokens.verification_code(phone).await?;
        if stored.as_deref() != Some(code) {
            return Err(AuthError::InvalidCode);
        }

        let user = self
            .user_repo
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.user_repo.mark_phone_verified(user.id).await?;

        if let Err(e) = self.tokens.delete_verification_code(phone).await {
            tracing::warn!(error = %e, "Failed to delete verification code");
        }

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn resend_code(&self, phone: &str) -> Result<(), AuthError> {
        let user = self
            .user_repo
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_phone_verified() {
            return Err(AuthError::AlreadyVerified);
        }

        self.issue_code(&user.phone).await
    }

    #[tracing::instrument(skip(self, password))]
    async fn login(&self, phone: &str, password: &str) -> Result<TokenResponse, AuthError> {
        let user = self
            .user_repo
            .find_by_phone(phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_phone_verified() {
            return Err(AuthError::PhoneNotVerified);
        }

        let session = self.issue_session(user.id).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(session)
    }

    async fn refresh(&self, token: &str) -> Result<TokenResponse, AuthError> {
        let claims = self.keys.decode(token)?;

        if !self.tokens.token_exists(claims.user_id, token).await? {
            return Err(AuthError::SessionRevoked);
        }

        self.tokens.revoke_token(claims.user_id, token).await?;
        self.issue_session(claims.user_id).await
    }

    async fn logout(&self, user_id: i64, token: &str) -> Result<(), AuthError> {
        self.tokens.revoke_token(user_id, token).await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }
}

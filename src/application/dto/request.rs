//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::shared::error::AppError;

/// Upper bound for a single page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Accepts international numbers: an optional leading `+` followed by 10-15 digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = (10..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("phone");
        error.message = Some("Invalid phone number".into());
        Err(error)
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(length(min = 6, max = 50, message = "Password must be 6-50 characters"))]
    pub password: String,
}

/// Phone verification request
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyPhoneRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(length(min = 4, max = 10, message = "Invalid verification code"))]
    pub code: String,
}

/// Verification code resend request
#[derive(Debug, Deserialize, Validate)]
pub struct ResendCodeRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Personal info update
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be 2-50 characters"))]
    pub first_name: String,

    #[validate(length(max = 80, message = "Last name must be at most 80 characters"))]
    pub last_name: Option<String>,
}

/// Create chat request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    #[validate(range(min = 1, message = "Invalid user id"))]
    pub user_id: i64,
}

/// Edit message request
#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be 1-5000 characters"))]
    pub content: String,
}

/// User search query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Limit/offset pagination
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationQuery {
    /// Resolve to `(limit, offset)`, falling back to `default_limit`.
    pub fn resolve(&self, default_limit: i64) -> Result<(i64, i64), AppError> {
        let limit = match self.limit {
            None => default_limit,
            Some(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
            Some(_) => return Err(AppError::BadRequest("Invalid limit".into())),
        };

        let offset = match self.offset {
            None => 0,
            Some(offset) if offset >= 0 => offset,
            Some(_) => return Err(AppError::BadRequest("Invalid offset".into())),
        };

        Ok((limit, offset))
    }
}

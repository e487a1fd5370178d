//! Authentication Handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    LoginRequest, RefreshTokenRequest, RegisterRequest, ResendCodeRequest, VerifyPhoneRequest,
};
use crate::application::dto::response::{MessageBody, TokenResponse, UserResponse};
use crate::application::services::{AuthService, AuthServiceImpl, JwtKeys};
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::middleware::{AuthUser, BearerToken};
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn auth_service(state: &AppState) -> AuthServiceImpl<PgUserRepository> {
    AuthServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.token_store.clone(),
        state.code_sender.clone(),
        JwtKeys::new(&state.settings.jwt),
        state.settings.verification.clone(),
    )
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    validate(&body)?;

    let user = auth_service(&state)
        .register(&body.username, &body.phone, &body.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Confirm a phone number with its verification code
pub async fn verify_phone(
    State(state): State<AppState>,
    Json(body): Json<VerifyPhoneRequest>,
) -> Result<Json<MessageBody>, AppError> {
    validate(&body)?;

    auth_service(&state)
        .verify_phone(&body.phone, &body.code)
        .await?;

    Ok(Json(MessageBody::new("Phone verified")))
}

/// Send a fresh verification code
pub async fn resend_code(
    State(state): State<AppState>,
    Json(body): Json<ResendCodeRequest>,
) -> Result<Json<MessageBody>, AppError> {
    validate(&body)?;

    auth_service(&state).resend_code(&body.phone).await?;

    Ok(Json(MessageBody::new("Verification code sent")))
}

/// Login with phone and password
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate(&body)?;

    let token = auth_service(&state)
        .login(&body.phone, &body.password)
        .await?;

    Ok(Json(token))
}

/// Exchange a token for a new one
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate(&body)?;

    let token = auth_service(&state).refresh(&body.token).await?;

    Ok(Json(token))
}

/// Logout (revoke the bearer token)
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    BearerToken(token): BearerToken,
) -> Result<Json<MessageBody>, AppError> {
    auth_service(&state).logout(auth.user_id, &token).await?;

    Ok(Json(MessageBody::new("Logged out")))
}

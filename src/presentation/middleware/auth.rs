//! Authentication Middleware
//!
//! Bearer token validation for protected routes. When a user repository is
//! attached, every authenticated request also stamps `users.last_seen`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::application::services::SessionVerifier;
use crate::domain::UserRepository;
use crate::presentation::http::extractors::{bearer_token, AuthUser, BearerToken};
use crate::shared::error::AppError;

/// State of [`auth_middleware`].
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn SessionVerifier>,
    /// Where request activity is recorded, if anywhere
    pub activity: Option<Arc<dyn UserRepository>>,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn SessionVerifier>) -> Self {
        Self {
            verifier,
            activity: None,
        }
    }

    pub fn with_activity(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.activity = Some(users);
        self
    }
}

/// Resolve the bearer token to a user and attach [`AuthUser`] and
/// [`BearerToken`] to the request.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?
        .to_string();

    let user_id = auth
        .verifier
        .verify(&token)
        .await
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    if let Some(users) = &auth.activity {
        if let Err(e) = users.update_last_seen(user_id).await {
            tracing::warn!(user_id, error = %e, "Failed to update last_seen");
        }
    }

    request.extensions_mut().insert(AuthUser { user_id });
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

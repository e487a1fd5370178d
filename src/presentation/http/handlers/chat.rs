//! Chat Handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{CreateChatRequest, PaginationQuery};
use crate::application::dto::response::ChatResponse;
use crate::application::services::{ChatService, ChatServiceImpl};
use crate::domain::CHATS_LIMIT;
use crate::infrastructure::repositories::{
    PgChatRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn chat_service(
    state: &AppState,
) -> ChatServiceImpl<PgChatRepository, PgUserRepository, PgMessageRepository> {
    ChatServiceImpl::new(
        Arc::new(PgChatRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgMessageRepository::new(state.db.clone())),
        state.registry.clone(),
    )
}

/// Open a chat with another user
pub async fn create_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), AppError> {
    validate(&body)?;

    let chat = chat_service(&state)
        .create(auth.user_id, body.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(chat)))
}

/// Chats of the caller
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<ChatResponse>>, AppError> {
    let (limit, offset) = page.resolve(CHATS_LIMIT)?;

    let chats = chat_service(&state)
        .list(auth.user_id, limit, offset)
        .await?;

    Ok(Json(chats))
}

/// A single chat
pub async fn get_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
) -> Result<Json<ChatResponse>, AppError> {
    let chat = chat_service(&state).get(auth.user_id, chat_id).await?;
    Ok(Json(chat))
}

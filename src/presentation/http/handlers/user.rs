//! User Handlers
//!
//! Search, profile updates, profile pictures and presence queries.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::request::{PersonalInfoRequest, SearchQuery};
use crate::application::dto::response::{
    MessageBody, OnlineUsersResponse, UserPresenceResponse, UserResponse,
};
use crate::application::services::{
    picture_content_type, UploadDto, UserService, UserServiceImpl,
};
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::middleware::AuthUser;
use crate::presentation::websocket::RealtimeState;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn user_service(state: &AppState) -> UserServiceImpl<PgUserRepository> {
    UserServiceImpl::new(
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.registry.clone(),
        state.pictures.clone(),
    )
}

/// Search users by username or phone
pub async fn search_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = user_service(&state).search(&query.query).await?;
    Ok(Json(users))
}

/// Update first and last name of the caller
pub async fn update_personal_info(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PersonalInfoRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate(&body)?;

    let user = user_service(&state)
        .update_personal_info(auth.user_id, &body.first_name, body.last_name)
        .await?;

    Ok(Json(user))
}

/// Replace the caller's profile picture with the multipart `picture` field
pub async fn update_profile_picture(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("picture") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("picture").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_multipart)?;

        upload = Some(UploadDto {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let upload = upload.ok_or_else(|| AppError::field("picture", "is required"))?;
    let user = user_service(&state)
        .update_profile_picture(auth.user_id, upload)
        .await?;

    Ok(Json(user))
}

pub async fn delete_profile_picture(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MessageBody>, AppError> {
    user_service(&state)
        .delete_profile_picture(auth.user_id)
        .await?;

    Ok(Json(MessageBody::new("Profile picture deleted")))
}

/// Serve a stored profile picture
pub async fn get_profile_picture(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let bytes = user_service(&state).profile_picture(&filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, picture_content_type(&filename)),
            (header::CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid form data: {}", e))
}

/// Ids of all users with a live connection
pub async fn online_users(
    State(realtime): State<RealtimeState>,
    _auth: AuthUser,
) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        online_users: realtime.registry.list_online(),
    })
}

/// Presence of a single user
pub async fn user_presence(
    State(realtime): State<RealtimeState>,
    _auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Json<UserPresenceResponse> {
    let presence = realtime.registry.get_presence(user_id);

    Json(UserPresenceResponse {
        user_id,
        is_online: presence.map(|p| p.is_online).unwrap_or(false),
        last_seen: presence.map(|p| p.last_seen_at),
    })
}

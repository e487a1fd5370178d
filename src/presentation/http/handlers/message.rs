//! Message Handlers

use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::request::{EditMessageRequest, PaginationQuery};
use crate::application::dto::response::{MessageBody, MessageResponse};
use crate::application::services::{
    MessageService, MessageServiceImpl, SendMessageDto, UploadDto,
};
use crate::domain::MESSAGES_LIMIT;
use crate::infrastructure::repositories::{
    PgAttachmentRepository, PgChatRepository, PgMessageRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

type Service = MessageServiceImpl<
    PgMessageRepository,
    PgChatRepository,
    PgUserRepository,
    PgAttachmentRepository,
>;

fn message_service(state: &AppState) -> Service {
    MessageServiceImpl::new(
        Arc::new(PgMessageRepository::new(state.db.clone())),
        Arc::new(PgChatRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        Arc::new(PgAttachmentRepository::new(state.db.clone())),
        state.storage.clone(),
        state.notifier.clone(),
    )
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Invalid form data: {}", e))
}

async fn text_field(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(bad_multipart)
}

fn parse_id(field: &str, value: &str) -> Result<i64, AppError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::field(field, "must be a positive integer"))
}

/// Read the multipart body of a send request.
///
/// Fields: `content`, `recipientId`, optional `parentId` (`0` or empty means
/// none) and any number of `attachments` / `attachments[]` files.
async fn read_send_form(
    chat_id: i64,
    mut multipart: Multipart,
) -> Result<SendMessageDto, AppError> {
    let mut request = SendMessageDto {
        chat_id,
        ..SendMessageDto::default()
    };
    let mut recipient_id = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "content" => request.content = Some(text_field(field).await?),
            "recipientId" => {
                let value = text_field(field).await?;
                recipient_id = Some(parse_id("recipientId", &value)?);
            }
            "parentId" => {
                let value = text_field(field).await?;
                let value = value.trim();
                if !value.is_empty() && value != "0" {
                    request.parent_id = Some(parse_id("parentId", value)?);
                }
            }
            "attachments" | "attachments[]" => {
                let file_name = field.file_name().unwrap_or("file").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;

                if !bytes.is_empty() {
                    request.attachments.push(UploadDto {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    request.recipient_id =
        recipient_id.ok_or_else(|| AppError::field("recipientId", "is required"))?;

    Ok(request)
}

/// Send a message with optional attachments
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let request = read_send_form(chat_id, multipart).await?;

    let message = message_service(&state).send(auth.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Message history of a chat
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<i64>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<MessageResponse>>, AppError> {
    let (limit, offset) = page.resolve(MESSAGES_LIMIT)?;

    let messages = message_service(&state)
        .history(auth.user_id, chat_id, limit, offset)
        .await?;

    Ok(Json(messages))
}

/// Edit message content
pub async fn edit_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate(&body)?;

    let message = message_service(&state)
        .edit(auth.user_id, message_id, &body.content)
        .await?;

    Ok(Json(message))
}

/// Delete a message and its attachments
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageBody>, AppError> {
    message_service(&state)
        .delete(auth.user_id, message_id)
        .await?;

    Ok(Json(MessageBody::new("Message deleted")))
}

/// Mark a message as read by its recipient
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = message_service(&state)
        .mark_read(auth.user_id, message_id)
        .await?;

    Ok(Json(message))
}

/// Serve a stored attachment
pub async fn get_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (attachment, bytes) = message_service(&state)
        .download_attachment(auth.user_id, &filename)
        .await?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        attachment.file_name.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, attachment.file_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

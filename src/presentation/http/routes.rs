//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Router,
};

use super::handlers;
use crate::application::services::MAX_PICTURE_BYTES;
use crate::infrastructure::metrics;
use crate::infrastructure::repositories::PgUserRepository;
use crate::presentation::middleware::{auth_middleware, logging, AuthState};
use crate::presentation::websocket::{ws_handler, RealtimeState};
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let realtime = state.realtime();
    let auth = AuthState::new(state.verifier.clone())
        .with_activity(Arc::new(PgUserRepository::new(state.db.clone())));
    let upload_limit = state.settings.storage.max_upload_mb * 1024 * 1024;

    Router::new()
        .merge(auth_routes(auth.clone()))
        .merge(user_routes(auth.clone()))
        .merge(chat_routes(auth.clone(), upload_limit))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(realtime_routes(realtime, auth))
        .layer(middleware::from_fn(logging::track_metrics))
}

/// Live connection endpoint and presence queries.
///
/// Only needs the registry and a session verifier, so it can be mounted on
/// its own.
pub fn realtime_routes<S>(realtime: RealtimeState, auth: AuthState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let presence = Router::new()
        .route("/api/users/online", get(handlers::user::online_users))
        .route("/api/users/{id}/online", get(handlers::user::user_presence))
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/ws", get(ws_handler))
        .merge(presence)
        .with_state(realtime)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Account routes. Everything but logout is public.
fn auth_routes(auth: AuthState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/api/register", post(handlers::auth::register))
        .route("/api/phone/verify", post(handlers::auth::verify_phone))
        .route("/api/phone/resend", post(handlers::auth::resend_code))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/refresh-token", post(handlers::auth::refresh_token))
        .merge(protected)
}

/// User routes (protected)
fn user_routes(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route("/api/users", get(handlers::user::search_users))
        .route(
            "/api/users/personal-info",
            put(handlers::user::update_personal_info),
        )
        .route(
            "/api/users/profile-picture",
            put(handlers::user::update_profile_picture)
                .layer(DefaultBodyLimit::max(MAX_PICTURE_BYTES + 64 * 1024))
                .delete(handlers::user::delete_profile_picture),
        )
        .route(
            "/api/users/profile-picture/{filename}",
            get(handlers::user::get_profile_picture),
        )
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware))
}

/// Chat, message and attachment routes (protected)
fn chat_routes(auth: AuthState, upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/chats",
            post(handlers::chat::create_chat).get(handlers::chat::list_chats),
        )
        .route("/api/chats/{id}", get(handlers::chat::get_chat))
        .route(
            "/api/chats/{id}/messages",
            post(handlers::message::send_message)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(handlers::message::get_messages),
        )
        .route(
            "/api/messages/{id}",
            put(handlers::message::edit_message).delete(handlers::message::delete_message),
        )
        .route("/api/messages/{id}/read", patch(handlers::message::mark_read))
        .route(
            "/api/attachments/{filename}",
            get(handlers::message::get_attachment),
        )
        .route_layer(middleware::from_fn_with_state(auth, auth_middleware))
}

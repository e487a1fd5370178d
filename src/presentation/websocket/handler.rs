//! Live Connection Handler
//!
//! `GET /ws` authenticates the caller before upgrading. Once upgraded, the
//! connection is registered with the [`PresenceRegistry`] and split in two:
//!
//! - a writer task that drains the connection's outbox into the socket and
//!   sends periodic pings, bounding every write by `write_timeout_ms`
//! - a read loop that discards inbound frames and ends on close, error,
//!   idle timeout or a shutdown request
//!
//! Cleanup runs from a drop guard so the registry is released on every exit
//! path, including task cancellation.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        rejection::QueryRejection,
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::connection::{ConnectionHandle, ConnectionId, Outbox};
use super::registry::PresenceRegistry;
use crate::application::services::SessionVerifier;
use crate::config::WebSocketSettings;
use crate::presentation::http::extractors::bearer_token;
use crate::shared::error::AppError;

/// State needed by the live connection endpoint.
///
/// Kept separate from `AppState` so the endpoint can be served without a
/// database or token store behind it.
#[derive(Clone)]
pub struct RealtimeState {
    pub registry: Arc<PresenceRegistry>,
    pub verifier: Arc<dyn SessionVerifier>,
    pub settings: Arc<WebSocketSettings>,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Bearer credential from `?token=` or the `Authorization` header.
fn credential(params: &ConnectParams, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = params.token.as_deref().filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    bearer_token(headers).map(str::to_string)
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(realtime): State<RealtimeState>,
    params: Result<Query<ConnectParams>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    // A query that does not parse carries no usable credential.
    let Query(params) = params.map_err(|e| {
        debug!(error = %e, "Rejected live connection with malformed query");
        AppError::Unauthorized("Malformed token parameter".into())
    })?;

    let token = credential(&params, &headers)
        .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;

    let user_id = realtime.verifier.verify(&token).await.map_err(|e| {
        debug!(error = %e, "Rejected live connection");
        AppError::Unauthorized(e.to_string())
    })?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    Ok(ws
        .max_message_size(realtime.settings.max_message_size)
        .max_frame_size(realtime.settings.max_frame_size)
        .on_upgrade(move |socket| run_connection(socket, user_id, realtime)))
}

/// Releases the registration when the connection task ends, however it ends.
struct RegistrationGuard {
    registry: Arc<PresenceRegistry>,
    user_id: i64,
    connection_id: ConnectionId,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.release(self.user_id, self.connection_id);
    }
}

async fn run_connection(socket: WebSocket, user_id: i64, realtime: RealtimeState) {
    let settings = realtime.settings.clone();
    let (handle, outbox) = ConnectionHandle::new(settings.send_queue_capacity);
    let connection_id = handle.id();
    let shutdown = outbox.shutdown.clone();
    let (sink, stream) = socket.split();

    realtime.registry.register(user_id, handle);
    let guard = RegistrationGuard {
        registry: realtime.registry.clone(),
        user_id,
        connection_id,
    };

    let mut writer = tokio::spawn(write_loop(
        sink,
        outbox,
        settings.clone(),
        user_id,
        connection_id,
    ));

    let writer_finished = tokio::select! {
        _ = read_loop(stream, shutdown, settings.idle_timeout(), user_id, connection_id) => false,
        _ = &mut writer => true,
    };

    drop(guard);

    if !writer_finished && timeout(settings.write_timeout(), &mut writer).await.is_err() {
        writer.abort();
    }

    info!(user_id, connection_id = %connection_id, "Connection closed");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    mut shutdown: watch::Receiver<bool>,
    idle: Duration,
    user_id: i64,
    connection_id: ConnectionId,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(user_id, connection_id = %connection_id, "Shutdown requested");
                break;
            }
            next = timeout(idle, stream.next()) => match next {
                Err(_) => {
                    debug!(user_id, connection_id = %connection_id, "Idle timeout");
                    break;
                }
                Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break,
                // Clients have nothing to say over this channel
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    debug!(user_id, connection_id = %connection_id, error = %e, "Read failed");
                    break;
                }
            },
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: Outbox,
    settings: Arc<WebSocketSettings>,
    user_id: i64,
    connection_id: ConnectionId,
) {
    let write_timeout = settings.write_timeout();
    let mut ping = tokio::time::interval(settings.ping_interval());
    ping.tick().await;

    loop {
        let message = tokio::select! {
            frame = outbox.frames.recv() => match frame {
                Some(text) => Message::Text(text.into()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
            _ = outbox.shutdown.changed() => {
                let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                break;
            }
        };

        match timeout(write_timeout, sink.send(message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(user_id, connection_id = %connection_id, error = %e, "Write failed");
                break;
            }
            Err(_) => {
                warn!(user_id, connection_id = %connection_id, "Write timed out");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    #[test]
    fn test_credential_prefers_query_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        let params = ConnectParams {
            token: Some("query-token".into()),
        };

        assert_eq!(credential(&params, &headers).as_deref(), Some("query-token"));
    }

    #[test]
    fn test_credential_falls_back_to_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        let params = ConnectParams { token: None };

        assert_eq!(credential(&params, &headers).as_deref(), Some("header-token"));
    }

    #[test]
    fn test_credential_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        let params = ConnectParams {
            token: Some(String::new()),
        };

        assert_eq!(credential(&params, &headers), None);
    }
}

//! Presence API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use messenger_server::presentation::websocket::ConnectionHandle;

use crate::common::{token_for, TestApp};

#[tokio::test]
async fn test_online_users_requires_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/users/online", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn test_online_users_rejects_bad_token() {
    let app = TestApp::new();

    let (status, _) = app.get("/api/users/online", Some("garbage")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_online_users_lists_registered_connections() {
    let app = TestApp::new();
    let (first, _first_outbox) = ConnectionHandle::new(8);
    let (second, _second_outbox) = ConnectionHandle::new(8);
    app.registry.register(7, first);
    app.registry.register(3, second);

    let (status, body) = app.get("/api/users/online", Some(&token_for(1))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "onlineUsers": [3, 7] }));
}

#[tokio::test]
async fn test_presence_of_unknown_user() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/users/42/online", Some(&token_for(1))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "userId": 42, "isOnline": false, "lastSeen": null })
    );
}

#[tokio::test]
async fn test_presence_after_disconnect_keeps_last_seen() {
    let app = TestApp::new();
    let (handle, _outbox) = ConnectionHandle::new(8);
    app.registry.register(5, handle);

    let (_, online) = app.get("/api/users/5/online", Some(&token_for(1))).await;
    assert_eq!(online["isOnline"], true);

    app.registry.deregister(5);

    let (status, offline) = app.get("/api/users/5/online", Some(&token_for(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offline["isOnline"], false);
    assert!(offline["lastSeen"].is_string());
}

//! Live Connection Tests

use axum::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::common::{connect, next_event, token_for, TestApp};

#[tokio::test]
async fn test_upgrade_without_token_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get("/ws", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn test_malformed_query_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.get("/ws?token=token-1&token=token-2", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 10003);
    assert_eq!(app.registry.connection_count(), 0);
}

#[tokio::test]
async fn test_handshake_with_invalid_token_is_refused() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let result = tokio_tungstenite::connect_async(format!("ws://{}/ws?token=nope", addr)).await;

    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED.as_u16());
        }
        other => panic!("expected an HTTP rejection, got {:?}", other.map(|_| ())),
    }
    assert_eq!(app.registry.connection_count(), 0);
}

#[tokio::test]
async fn test_authorization_header_is_accepted() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let mut request = tungstenite::client::IntoClientRequest::into_client_request(format!(
        "ws://{}/ws",
        addr
    ))
    .unwrap();
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token_for(11)).parse().unwrap(),
    );

    let (_client, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    app.wait_for_connections(1).await;
    assert!(app.registry.is_online(11));
}

#[tokio::test]
async fn test_peers_receive_status_changes() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let mut alice = connect(addr, 1).await;
    app.wait_for_connections(1).await;

    let mut bob = connect(addr, 2).await;
    app.wait_for_connections(2).await;

    let online = next_event(&mut alice).await;
    assert_eq!(online["event"], "statusChange");
    assert_eq!(online["userId"], 2);
    assert_eq!(online["isOnline"], true);

    bob.close(None).await.unwrap();
    app.wait_for_connections(1).await;

    let offline = next_event(&mut alice).await;
    assert_eq!(offline["event"], "statusChange");
    assert_eq!(offline["userId"], 2);
    assert_eq!(offline["isOnline"], false);
    assert!(!app.registry.is_online(2));
    assert!(app.registry.get_presence(2).is_some());
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_connection() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let mut first = connect(addr, 9).await;
    app.wait_for_connections(1).await;

    let _second = connect(addr, 9).await;

    // The superseded socket gets closed by the server.
    let ended = tokio::time::timeout(std::time::Duration::from_secs(2), async {
        use futures::StreamExt;
        loop {
            match first.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;

    assert!(ended.is_ok());
    app.wait_for_connections(1).await;
    assert!(app.registry.is_online(9));
}

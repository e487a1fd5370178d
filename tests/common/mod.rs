//! Common Test Utilities
//!
//! Builds the live connection and presence routes on top of an in-memory
//! registry and a stub session verifier, so no database or Redis is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use messenger_server::application::services::{AuthError, SessionVerifier};
use messenger_server::config::WebSocketSettings;
use messenger_server::presentation::http::{handlers::health, routes};
use messenger_server::presentation::middleware::AuthState;
use messenger_server::presentation::websocket::{PresenceRegistry, RealtimeState};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Accepts tokens of the form `token-{user_id}`.
pub struct StubVerifier;

#[async_trait]
impl SessionVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<i64, AuthError> {
        token
            .strip_prefix("token-")
            .and_then(|id| id.parse().ok())
            .ok_or(AuthError::InvalidToken)
    }
}

pub fn token_for(user_id: i64) -> String {
    format!("token-{}", user_id)
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<PresenceRegistry>,
}

impl TestApp {
    pub fn new() -> Self {
        let registry = Arc::new(PresenceRegistry::new());
        let verifier: Arc<dyn SessionVerifier> = Arc::new(StubVerifier);
        let realtime = RealtimeState {
            registry: registry.clone(),
            verifier: verifier.clone(),
            settings: Arc::new(WebSocketSettings {
                ping_interval_ms: 60_000,
                ..WebSocketSettings::default()
            }),
        };

        let router = routes::realtime_routes(realtime, AuthState::new(verifier))
            .route("/health", get(health::health_check))
            .route("/health/live", get(health::liveness));

        Self { router, registry }
    }

    /// Make a GET request, optionally with a bearer token
    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = self
            .router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        (status, body)
    }

    /// Serve the router on an ephemeral port
    pub async fn spawn(&self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        addr
    }

    /// Wait until the registry reports `count` live connections
    pub async fn wait_for_connections(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.registry.connection_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("connection count not reached");
    }
}

/// Open a live connection for `user_id` with `?token=`
pub async fn connect(addr: SocketAddr, user_id: i64) -> Client {
    let url = format!("ws://{}/ws?token={}", addr, token_for(user_id));
    let (client, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    client
}

/// Next JSON text frame, skipping control frames
pub async fn next_event(client: &mut Client) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {:?}", other),
            }
        }
    })
    .await
    .expect("no event within timeout")
}

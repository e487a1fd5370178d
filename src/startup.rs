//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{CodeSender, JwtKeys, SessionVerifier, TokenVerifier};
use crate::config::Settings;
use crate::domain::TokenStore;
use crate::infrastructure::cache::{self, RedisTokenStore};
use crate::infrastructure::database;
use crate::infrastructure::sms::LoggingCodeSender;
use crate::infrastructure::storage::{LocalStorage, Storage};
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::{Notifier, NotifierWorker, PresenceRegistry, RealtimeState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub registry: Arc<PresenceRegistry>,
    pub notifier: Notifier,
    pub verifier: Arc<dyn SessionVerifier>,
    pub token_store: Arc<dyn TokenStore>,
    pub code_sender: Arc<dyn CodeSender>,
    pub storage: Arc<dyn Storage>,
    pub pictures: Arc<dyn Storage>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// The slice of state the live connection endpoint works with
    pub fn realtime(&self) -> RealtimeState {
        RealtimeState {
            registry: self.registry.clone(),
            verifier: self.verifier.clone(),
            settings: Arc::new(self.settings.websocket.clone()),
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    worker: NotifierWorker,
    drain_timeout: Duration,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        database::run_migrations(&db).await?;
        tracing::info!("Database connection pool created");

        // Create Redis client
        let redis = cache::create_redis_client(&settings.redis).await?;

        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&settings.storage.root).await?);
        let pictures: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(Path::new(&settings.storage.root).join("profile_pictures")).await?,
        );
        tracing::info!(root = %settings.storage.root, "Attachment storage ready");

        // Presence registry and the notification dispatcher feeding it
        let registry = Arc::new(PresenceRegistry::new());
        let (notifier, worker) =
            Notifier::start(registry.clone(), settings.notifier.queue_capacity);

        let token_store: Arc<dyn TokenStore> = Arc::new(RedisTokenStore::new(redis.clone()));
        let verifier: Arc<dyn SessionVerifier> = Arc::new(TokenVerifier::new(
            JwtKeys::new(&settings.jwt),
            token_store.clone(),
        ));

        let drain_timeout = Duration::from_secs(settings.notifier.drain_timeout_secs);

        // Create app state
        let state = AppState {
            db,
            redis,
            registry,
            notifier,
            verifier,
            token_store,
            code_sender: Arc::new(LoggingCodeSender),
            storage,
            pictures,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(logging::create_trace_layer())
            .layer(cors::create_cors_layer(&settings.cors));

        // Bind to address
        let addr = settings.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            worker,
            drain_timeout,
        })
    }

    /// Run the server until stopped.
    ///
    /// On Ctrl-C the listener stops accepting, in-flight requests finish and
    /// queued notifications get `drain_timeout` to be delivered.
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped, draining notifications");
        self.worker.drain(self.drain_timeout).await;

        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

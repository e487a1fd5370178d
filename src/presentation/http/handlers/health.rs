//! Health Checks
//!
//! `/health` and `/health/live` answer as long as the process serves requests.
//! `/health/ready` pings Postgres and Redis and reports the real-time core:
//! users online and notifications still waiting for the dispatcher. It turns
//! 503 when either store is unreachable, since no request can authenticate or
//! persist without them.

use std::fmt::Display;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::Lazy;
use redis::aio::ConnectionManager;
use serde::Serialize;
use sqlx::PgPool;

use crate::infrastructure::database;
use crate::startup::AppState;

static STARTED: Lazy<Instant> = Lazy::new(Instant::now);

/// Pin the uptime origin to process start rather than the first check.
pub fn init_server_start() {
    Lazy::force(&STARTED);
}

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

/// Result of pinging one backing store.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyCheck {
    pub status: Status,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyCheck {
    fn measure<E: Display>(started: Instant, result: Result<(), E>) -> Self {
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => Self {
                status: Status::Up,
                latency_ms,
                error: None,
            },
            Err(e) => Self {
                status: Status::Down,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeStats {
    pub online_users: usize,
    pub queued_notifications: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub status: Status,
    pub uptime_seconds: u64,
    pub database: DependencyCheck,
    pub redis: DependencyCheck,
    pub realtime: RealtimeStats,
}

pub async fn health_check() -> Json<Liveness> {
    Json(Liveness {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<Liveness> {
    Json(Liveness {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let (database, redis) = tokio::join!(ping_database(&state.db), ping_redis(&state.redis));

    database::record_pool_stats(&state.db, state.settings.database.max_connections);

    let status = overall(&[&database, &redis]);
    let code = match status {
        Status::Up => StatusCode::OK,
        Status::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(Readiness {
            status,
            uptime_seconds: STARTED.elapsed().as_secs(),
            database,
            redis,
            realtime: RealtimeStats {
                online_users: state.registry.connection_count(),
                queued_notifications: state.notifier.queued(),
            },
        }),
    )
}

async fn ping_database(db: &PgPool) -> DependencyCheck {
    let started = Instant::now();
    let result = sqlx::query("SELECT 1").execute(db).await.map(|_| ());
    DependencyCheck::measure(started, result)
}

async fn ping_redis(redis: &ConnectionManager) -> DependencyCheck {
    let mut conn = redis.clone();
    let started = Instant::now();
    let result = redis::cmd("PING")
        .query_async::<String>(&mut conn)
        .await
        .map(|_| ());
    DependencyCheck::measure(started, result)
}

fn overall(checks: &[&DependencyCheck]) -> Status {
    if checks.iter().all(|c| c.status == Status::Up) {
        Status::Up
    } else {
        Status::Down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn up() -> DependencyCheck {
        DependencyCheck::measure::<&str>(Instant::now(), Ok(()))
    }

    fn down() -> DependencyCheck {
        DependencyCheck::measure(Instant::now(), Err("connection refused"))
    }

    #[tokio::test]
    async fn test_liveness() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "alive");
    }

    #[test]
    fn test_failed_ping_keeps_error() {
        let check = down();
        assert_eq!(check.status, Status::Down);
        assert_eq!(check.error.as_deref(), Some("connection refused"));
        assert!(up().error.is_none());
    }

    #[test]
    fn test_any_store_down_means_not_ready() {
        assert_eq!(overall(&[&up(), &up()]), Status::Up);
        assert_eq!(overall(&[&down(), &up()]), Status::Down);
        assert_eq!(overall(&[&up(), &down()]), Status::Down);
    }

    #[test]
    fn test_readiness_shape() {
        let body = serde_json::to_value(Readiness {
            status: Status::Down,
            uptime_seconds: 12,
            database: DependencyCheck {
                status: Status::Up,
                latency_ms: 3,
                error: None,
            },
            redis: down(),
            realtime: RealtimeStats {
                online_users: 2,
                queued_notifications: 0,
            },
        })
        .unwrap();

        assert_eq!(body["status"], "down");
        assert_eq!(body["database"], json!({ "status": "up", "latencyMs": 3 }));
        assert_eq!(body["redis"]["error"], "connection refused");
        assert_eq!(
            body["realtime"],
            json!({ "onlineUsers": 2, "queuedNotifications": 0 })
        );
    }
}

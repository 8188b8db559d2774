/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - process is up, reports version and uptime
 * - Readiness check (`/health/ready`) - pings the database
 */

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime};
use std::sync::OnceLock;
use tracing::{debug, error};
use utoipa::ToSchema;

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ReadinessInfo {
    pub ready: bool,
    pub database: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

static STARTED_AT: OnceLock<SystemTime> = OnceLock::new();

/// Marks process start; uptime is measured from the first call.
pub fn mark_started() {
    STARTED_AT.get_or_init(SystemTime::now);
}

fn uptime_seconds() -> u64 {
    STARTED_AT
        .get()
        .and_then(|start| SystemTime::now().duration_since(*start).ok())
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Liveness: the process answers requests
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthInfo)),
    tag = "Health"
)]
pub async fn health_check() -> impl IntoResponse {
    debug!("Health check endpoint called");

    Json(HealthInfo {
        status: HealthStatus::Up,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        uptime_seconds: uptime_seconds(),
    })
}

/// Readiness: the database answers a ping
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready to accept traffic", body = ReadinessInfo),
        (status = 503, description = "Database unreachable", body = ReadinessInfo),
    ),
    tag = "Health"
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let (database, latency_ms) = match state.db.ping().await {
        Ok(()) => (HealthStatus::Up, Some(started.elapsed().as_millis() as u64)),
        Err(e) => {
            error!("Database health check failed: {}", e);
            (HealthStatus::Down, None)
        }
    };

    let status_code = match database {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(ReadinessInfo {
            ready: database == HealthStatus::Up,
            database,
            latency_ms,
            timestamp: Utc::now(),
        }),
    )
}

/// Creates router with health check endpoints
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

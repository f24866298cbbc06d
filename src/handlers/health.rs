use crate::handlers::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use utoipa::ToSchema;

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: ComponentHealth,
    pub response_time_ms: u64,
}

static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Records process start for the uptime figure. Call once at startup.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe; never touches the database.
#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Process is running")),
    tag = "health"
)]
pub async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Pings the database. 503 when it cannot be reached.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database reachable", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let db_result = crate::db::check_connection(&state.db).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let database = match db_result {
        Ok(()) => ComponentHealth {
            status: ComponentStatus::Up,
            message: "Connection successful".to_string(),
            latency_ms: Some(latency_ms),
        },
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: "Connection failed".to_string(),
                latency_ms: Some(latency_ms),
            }
        }
    };
    let status = database.status;
    let code = match status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        database,
        response_time_ms: start.elapsed().as_millis() as u64,
    };
    (code, Json(response))
}

/// `GET /health` (database ping) and `GET /health/live`.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
}

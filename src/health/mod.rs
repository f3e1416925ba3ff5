/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - cached up/down status
 * - Readiness check (`/health/ready`) - pings the databases before answering
 * - Liveness check (`/health/live`) - process is alive
 * - Version (`/health/version`)
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::db::DbPool;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: HashMap<String, HealthDetail>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DbPool>,
    pub vehicles_db: Option<Arc<DbPool>>,
    pub health_cache: Arc<RwLock<HealthInfo>>,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(db_pool: Arc<DbPool>, vehicles_db: Option<Arc<DbPool>>) -> Self {
        Self {
            db_pool,
            vehicles_db,
            health_cache: Arc::new(RwLock::new(HealthInfo {
                status: HealthStatus::Up,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                uptime_seconds: 0,
                details: HashMap::new(),
            })),
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Re-pings every connection and recomputes the overall status.
    ///
    /// The vehicle registry is optional, so losing it only degrades the
    /// service.
    pub async fn update_health(&self) {
        let database = match self.db_pool.ping().await {
            Ok(()) => HealthDetail {
                status: HealthStatus::Up,
                message: None,
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!("Database health check failed: {}", e);
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        };

        let registry = match &self.vehicles_db {
            None => HealthDetail {
                status: HealthStatus::Up,
                message: Some("not configured".to_string()),
                timestamp: Utc::now(),
            },
            Some(conn) => match conn.ping().await {
                Ok(()) => HealthDetail {
                    status: HealthStatus::Up,
                    message: None,
                    timestamp: Utc::now(),
                },
                Err(e) => {
                    warn!("Vehicle registry health check failed: {}", e);
                    HealthDetail {
                        status: HealthStatus::Degraded,
                        message: Some(e.to_string()),
                        timestamp: Utc::now(),
                    }
                }
            },
        };

        let mut health = self.health_cache.write().await;
        health.timestamp = Utc::now();
        health.uptime_seconds = self.uptime();
        health.details.insert("database".to_string(), database);
        health
            .details
            .insert("vehicle_registry".to_string(), registry);
        health.status = overall_status(health.details.values().map(|d| d.status));
    }
}

fn overall_status(statuses: impl Iterator<Item = HealthStatus>) -> HealthStatus {
    let mut overall = HealthStatus::Up;
    for status in statuses {
        match status {
            HealthStatus::Down => return HealthStatus::Down,
            HealthStatus::Degraded => overall = HealthStatus::Degraded,
            HealthStatus::Up => {}
        }
    }
    overall
}

pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": env!("CARGO_PKG_NAME"),
    }))
}

pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("Health check endpoint called");
    let health = state.health_cache.read().await;
    (
        health.status.status_code(),
        Json(json!({
            "status": health.status,
            "version": health.version,
            "timestamp": health.timestamp,
        })),
    )
}

pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.update_health().await;
    let health = state.health_cache.read().await;
    (health.status.status_code(), Json(health.clone()))
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

pub fn health_routes<S>(db_pool: Arc<DbPool>, vehicles_db: Option<Arc<DbPool>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let health_state = Arc::new(HealthState::new(db_pool, vehicles_db));
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
        .with_state(health_state)
}

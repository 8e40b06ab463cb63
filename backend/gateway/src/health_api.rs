//! Gateway Health API
//!
//! Reports process liveness along with connected session and entity counts.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub sessions: usize,
    pub entities: usize,
    pub uptime_seconds: i64,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    let now = Utc::now();
    Json(HealthReport {
        status: "ok".into(),
        service: "worldsync".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: state.registry.len().await,
        entities: state.store.len().await,
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now,
    })
}

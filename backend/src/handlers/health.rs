//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub realtime_subscribers: usize,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            false
        }
    };
    let (status, database) = health_labels(connected);

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        realtime_subscribers: state.events.subscriber_count(),
    })
}

/// Overall status and database label for a health report
pub fn health_labels(database_connected: bool) -> (&'static str, &'static str) {
    if database_connected {
        ("healthy", "connected")
    } else {
        ("degraded", "disconnected")
    }
}

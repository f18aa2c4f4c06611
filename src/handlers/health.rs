use axum::{extract::State, Json};
use std::sync::Arc;
use crate::models::{HealthResponse, ReadyResponse};
use crate::AppState;
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    debug!("Readiness check requested");
    Json(ReadyResponse {
        status: "ok".to_string(),
        storage: state.repo.backend_name().to_string(),
        flush_threshold: state.activity.threshold(),
    })
}

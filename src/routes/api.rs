use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::handlers::{diagnostics, health_check, ready_check, report_logs};
use crate::routes::auth_middleware::auth_middleware;
use crate::AppState;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/reports/:report_id/logs", get(report_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(protected)
        .with_state(state)
}

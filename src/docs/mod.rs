use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Service is ready to accept connections", body = ReadyResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Persisted activity log of a report
#[utoipa::path(
    get,
    path = "/api/v1/reports/{report_id}/logs",
    params(
        ("report_id" = String, Path, description = "Report identifier")
    ),
    responses(
        (status = 200, description = "Activity entries, oldest first", body = ReportLogsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin of the report", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn report_logs_doc() {}

/// Service diagnostics
#[utoipa::path(
    get,
    path = "/api/v1/diagnostics",
    responses(
        (status = 200, description = "Live rooms, connections and host load", body = DiagnosticsResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller lacks the admin role", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        report_logs_doc,
        diagnostics_doc,
    ),
    components(
        schemas(HealthResponse, ReadyResponse, LogEntry, ReportLogsResponse, DiagnosticsResponse, ErrorResponse)
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;

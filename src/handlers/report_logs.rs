use crate::{auth::auth, models::{ErrorResponse, Identity, ReportLogsResponse}, AppState};
use axum::{extract::{Extension, Path, State}, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{error, info};

/// Persisted activity for a report, oldest first
///
/// Entries still sitting in the in-memory buffer are not included.
pub async fn report_logs(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(report_id): Path<String>,
) -> Result<(StatusCode, Json<ReportLogsResponse>), (StatusCode, Json<ErrorResponse>)> {

    auth::ensure_report_admin(&state.access, &identity, &report_id).await?;

    let entries = match state.repo.fetch_logs(&report_id).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to fetch logs for report {}: {}", report_id, e);
            return Err(ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch report logs"));
        }
    };
    info!("Returning {} log entries for report {} to {}", entries.len(), report_id, identity.uid);

    let lines = entries.iter().map(|entry| entry.formatted()).collect();
    Ok((
        StatusCode::OK,
        Json(ReportLogsResponse {
            report_id,
            entries,
            lines,
        }),
    ))
}

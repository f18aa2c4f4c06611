use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One human-readable activity record for a report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub message: String,
}

impl LogEntry {
    /// Stamp a new entry; the stored message is prefixed with the acting user.
    pub fn new(user: &str, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.to_string(),
            message: format!("{} {}", user, message),
        }
    }

    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.message)
    }
}

/// Response for the report activity log
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReportLogsResponse {
    pub report_id: String,
    pub entries: Vec<LogEntry>,
    pub lines: Vec<String>,
}

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{LogEntry, SubsectionContent};

/// Durable report storage as seen by the sync engine.
///
/// Calls may be slow; callers never hold the connection registry lock
/// while awaiting them.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Subsections of a section, in the order the report template defines them.
    async fn fetch_section_contents(
        &self,
        report_id: &str,
        section: &str,
    ) -> Result<Vec<SubsectionContent>, RepositoryError>;

    /// Replace the stored content of one subsection (keyed by editor id).
    async fn update_section_content(
        &self,
        report_id: &str,
        section: &str,
        subsection: &str,
        content: &str,
    ) -> Result<(), RepositoryError>;

    async fn is_user_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError>;

    async fn is_admin_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError>;

    /// Persist a batch of activity entries in one write.
    async fn write_logs(&self, report_id: &str, entries: &[LogEntry]) -> Result<(), RepositoryError>;

    /// All persisted activity for a report, oldest first.
    async fn fetch_logs(&self, report_id: &str) -> Result<Vec<LogEntry>, RepositoryError>;

    /// Short name for readiness output.
    fn backend_name(&self) -> &'static str;
}

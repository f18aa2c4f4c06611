use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::repository::ReportRepository;
use crate::error::RepositoryError;
use crate::models::{LogEntry, SubsectionContent};

#[derive(Default)]
struct MemoryState {
    /// (report, section) -> ordered subsections
    sections: HashMap<(String, String), Vec<SubsectionContent>>,
    /// (uid, report) -> is_admin
    members: HashMap<(String, String), bool>,
    logs: HashMap<String, Vec<LogEntry>>,
}

/// In-process report store, used when no database is configured.
///
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryReportRepository {
    state: Mutex<MemoryState>,
}

impl MemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the subsections of a section, in template order, with empty content.
    pub fn seed_section(&self, report_id: &str, section: &str, subsections: &[&str]) {
        let mut state = self.lock();
        state.sections.insert(
            (report_id.to_string(), section.to_string()),
            subsections.iter().map(|title| SubsectionContent::new(*title, "")).collect(),
        );
    }

    pub fn add_member(&self, uid: &str, report_id: &str, admin: bool) {
        let mut state = self.lock();
        state.members.insert((uid.to_string(), report_id.to_string()), admin);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another task panicked mid-update; the maps are still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ReportRepository for MemoryReportRepository {
    async fn fetch_section_contents(
        &self,
        report_id: &str,
        section: &str,
    ) -> Result<Vec<SubsectionContent>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .sections
            .get(&(report_id.to_string(), section.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_section_content(
        &self,
        report_id: &str,
        section: &str,
        subsection: &str,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        let subsections = state
            .sections
            .entry((report_id.to_string(), section.to_string()))
            .or_default();
        match subsections.iter_mut().find(|s| s.title == subsection) {
            Some(existing) => existing.content = content.to_string(),
            None => subsections.push(SubsectionContent::new(subsection, content)),
        }
        Ok(())
    }

    async fn is_user_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock().members.contains_key(&(uid.to_string(), report_id.to_string())))
    }

    async fn is_admin_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .lock()
            .members
            .get(&(uid.to_string(), report_id.to_string()))
            .copied()
            .unwrap_or(false))
    }

    async fn write_logs(&self, report_id: &str, entries: &[LogEntry]) -> Result<(), RepositoryError> {
        self.lock()
            .logs
            .entry(report_id.to_string())
            .or_default()
            .extend_from_slice(entries);
        Ok(())
    }

    async fn fetch_logs(&self, report_id: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        let mut logs = self.lock().logs.get(report_id).cloned().unwrap_or_default();
        logs.sort_by_key(|entry| entry.timestamp);
        Ok(logs)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

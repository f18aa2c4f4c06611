//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{MemoryReportRepository, ReportRepository};
use crate::error::{ConnectionError, RepositoryError};
use crate::models::{LogEntry, SubsectionContent};
use crate::websocket::Connection;

#[derive(Clone, Copy, PartialEq)]
enum Behaviour {
    Ok,
    Fail,
    Stall,
    Wedged,
}

/// A connection that records every frame written to it.
pub struct RecordingConnection {
    id: Uuid,
    behaviour: Behaviour,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    fn with(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            behaviour,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::with(Behaviour::Ok)
    }

    /// Every write errors.
    pub fn failing() -> Arc<Self> {
        Self::with(Behaviour::Fail)
    }

    /// Every write hangs until the caller gives up.
    pub fn stalled() -> Arc<Self> {
        Self::with(Behaviour::Stall)
    }

    /// Writes and closes both hang forever, like a peer whose TCP buffer is full.
    pub fn wedged() -> Arc<Self> {
        Self::with(Behaviour::Wedged)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        match self.behaviour {
            Behaviour::Ok => {
                self.sent.lock().unwrap().push(text);
                Ok(())
            }
            Behaviour::Fail => Err(ConnectionError::Transport("broken pipe".to_string())),
            Behaviour::Stall | Behaviour::Wedged => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn close(&self) {
        if self.behaviour == Behaviour::Wedged {
            std::future::pending::<()>().await;
        }
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub report_id: String,
    pub section: String,
    pub subsection: String,
    pub content: String,
}

/// In-memory repository that records writes and can be told to fail.
#[derive(Default)]
pub struct RecordingRepository {
    inner: MemoryReportRepository,
    updates: Mutex<Vec<RecordedUpdate>>,
    log_batches: Mutex<Vec<(String, Vec<LogEntry>)>>,
    fetches: Mutex<usize>,
    fail_updates: AtomicBool,
    fail_fetches: AtomicBool,
    fail_log_writes: AtomicBool,
}

impl RecordingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn memory(&self) -> &MemoryReportRepository {
        &self.inner
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn log_batches(&self) -> Vec<(String, Vec<LogEntry>)> {
        self.log_batches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_log_writes(&self, fail: bool) {
        self.fail_log_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportRepository for RecordingRepository {
    async fn fetch_section_contents(
        &self,
        report_id: &str,
        section: &str,
    ) -> Result<Vec<SubsectionContent>, RepositoryError> {
        *self.fetches.lock().unwrap() += 1;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("fetch disabled".to_string()));
        }
        self.inner.fetch_section_contents(report_id, section).await
    }

    async fn update_section_content(
        &self,
        report_id: &str,
        section: &str,
        subsection: &str,
        content: &str,
    ) -> Result<(), RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("update disabled".to_string()));
        }
        self.updates.lock().unwrap().push(RecordedUpdate {
            report_id: report_id.to_string(),
            section: section.to_string(),
            subsection: subsection.to_string(),
            content: content.to_string(),
        });
        self.inner
            .update_section_content(report_id, section, subsection, content)
            .await
    }

    async fn is_user_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        self.inner.is_user_in_report(uid, report_id).await
    }

    async fn is_admin_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        self.inner.is_admin_in_report(uid, report_id).await
    }

    async fn write_logs(&self, report_id: &str, entries: &[LogEntry]) -> Result<(), RepositoryError> {
        if self.fail_log_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("log writes disabled".to_string()));
        }
        self.log_batches
            .lock()
            .unwrap()
            .push((report_id.to_string(), entries.to_vec()));
        self.inner.write_logs(report_id, entries).await
    }

    async fn fetch_logs(&self, report_id: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        self.inner.fetch_logs(report_id).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

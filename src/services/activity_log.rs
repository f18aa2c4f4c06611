//! Per-report activity buffering.
//!
//! Appends are cheap and synchronous. Entries reach storage in batches,
//! either when a report's buffer fills up or on the periodic flush tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::db::ReportRepository;
use crate::models::LogEntry;

#[derive(Clone)]
pub struct ActivityLogBuffer {
    buffers: Arc<Mutex<HashMap<String, Vec<LogEntry>>>>,
    repo: Arc<dyn ReportRepository>,
    threshold: usize,
}

impl ActivityLogBuffer {
    pub fn new(repo: Arc<dyn ReportRepository>, threshold: usize) -> Self {
        Self {
            buffers: Arc::new(Mutex::new(HashMap::new())),
            repo,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record `"{user} {message}"` for a report. Never waits on storage.
    ///
    /// Must be called from within a tokio runtime; a full buffer spawns its flush.
    pub fn append(&self, report_id: &str, user: &str, message: &str) {
        let entry = LogEntry::new(user, message);
        debug!("Activity for report {}: {}", report_id, entry.message);

        let full = {
            let mut buffers = self.lock();
            let entries = buffers.entry(report_id.to_string()).or_default();
            entries.push(entry);
            entries.len() >= self.threshold
        };

        if full {
            let buffer = self.clone();
            let report_id = report_id.to_string();
            tokio::spawn(async move {
                buffer.flush(&report_id).await;
            });
        }
    }

    /// Write out everything buffered for one report.
    ///
    /// Returns the number of entries persisted. A failed write drops the batch.
    pub async fn flush(&self, report_id: &str) -> usize {
        let batch = match self.lock().remove(report_id) {
            Some(entries) if !entries.is_empty() => entries,
            _ => return 0,
        };

        match self.repo.write_logs(report_id, &batch).await {
            Ok(()) => {
                debug!("Flushed {} activity entries for report {}", batch.len(), report_id);
                batch.len()
            }
            Err(e) => {
                error!("Lost {} activity entries for report {}: {}", batch.len(), report_id, e);
                0
            }
        }
    }

    /// Flush every report with pending entries and wait for all of them.
    pub async fn flush_all(&self) -> usize {
        let mut written = 0;
        for report_id in self.pending_reports() {
            written += self.flush(&report_id).await;
        }
        written
    }

    /// Spawn the background task that flushes every non-empty buffer on each tick.
    pub fn spawn_flusher(&self, period: Duration) -> JoinHandle<()> {
        let buffer = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for report_id in buffer.pending_reports() {
                    let buffer = buffer.clone();
                    tokio::spawn(async move {
                        buffer.flush(&report_id).await;
                    });
                }
            }
        })
    }

    /// Entries appended but not yet handed to storage.
    pub fn buffered_len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    fn pending_reports(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(report_id, _)| report_id.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<LogEntry>>> {
        self.buffers.lock().unwrap_or_else(|poisoned| {
            info!("Recovering poisoned activity log lock");
            poisoned.into_inner()
        })
    }
}

use std::sync::Arc;

use crate::auth::auth::ReportAccess;
use crate::config::Config;
use crate::db::ReportRepository;
use crate::services::activity_log::ActivityLogBuffer;
use crate::websocket::registry::ConnectionRegistry;

/// Shared application state handed to every route.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<ConnectionRegistry>,
    pub repo: Arc<dyn ReportRepository>,
    pub activity: ActivityLogBuffer,
    pub access: ReportAccess,
}

impl AppState {
    pub fn new(config: Config, repo: Arc<dyn ReportRepository>) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(config.ws_write_timeout())),
            activity: ActivityLogBuffer::new(repo.clone(), config.log_flush_threshold),
            access: ReportAccess::new(repo.clone(), config.membership_cache_ttl()),
            repo,
            config,
        }
    }
}

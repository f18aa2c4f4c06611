pub mod dbreport;
pub mod memory;
pub mod repository;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::Config;

pub use dbreport::DbReport;
pub use memory::MemoryReportRepository;
pub use repository::ReportRepository;

/// Connect to `DB_URL`, or fall back to an in-memory store seeded from `MEMBERS`.
pub async fn open_repository(config: &Config) -> Arc<dyn ReportRepository> {
    if let Some(db_url) = &config.db_url {
        match DbReport::new(db_url).await {
            Ok(db) => {
                if let Err(e) = db.ensure_schema().await {
                    error!("Failed to prepare database schema: {}", e);
                }
                info!("Database initialized successfully");
                return Arc::new(db);
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Falling back to in-memory report storage");
            }
        }
    } else {
        warn!("No database URL configured - report content will not survive a restart");
    }

    let memory = MemoryReportRepository::new();
    match config.member_grants() {
        Ok(grants) => {
            for grant in &grants {
                memory.add_member(&grant.uid, &grant.report_id, grant.admin);
            }
            info!("Granted {} report memberships from configuration", grants.len());
        }
        Err(e) => error!("Ignoring MEMBERS: {}", e),
    }
    Arc::new(memory)
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Iden, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Error as SqlxError, Row};
use std::time::Duration;
use tracing::{error, info};

use crate::db::repository::ReportRepository;
use crate::error::RepositoryError;
use crate::models::{LogEntry, SubsectionContent};

#[derive(Iden)]
enum ReportLogs {
    Table,
    Id,
    ReportId,
    UserId,
    Message,
    CreatedAt,
}

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS report_sections (
        report_id   TEXT NOT NULL,
        section     TEXT NOT NULL,
        subsection  TEXT NOT NULL,
        position    INTEGER NOT NULL DEFAULT 0,
        content     TEXT NOT NULL DEFAULT '',
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (report_id, section, subsection)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_members (
        report_id   TEXT NOT NULL,
        uid         TEXT NOT NULL,
        is_admin    BOOLEAN NOT NULL DEFAULT FALSE,
        is_owner    BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (report_id, uid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS report_logs (
        id          BIGSERIAL PRIMARY KEY,
        report_id   TEXT NOT NULL,
        user_id     TEXT NOT NULL,
        message     TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// PostgreSQL-backed report store
pub struct DbReport {
    pool: PgPool,
}

impl DbReport {
    /// Create a new database connection pool
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn new(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        Ok(Self { pool })
    }

    /// Create the tables this service reads and writes, if they are missing.
    pub async fn ensure_schema(&self) -> Result<(), SqlxError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Database schema verified");
        Ok(())
    }

    fn log_pool_state(&self, action: &str, report_id: &str) {
        let pool_idle = self.pool.num_idle() as u32;
        let pool_size = self.pool.size();
        info!(
            "{} for report {}. Pool connections: {} idle, {} in use",
            action,
            report_id,
            pool_idle,
            pool_size.saturating_sub(pool_idle)
        );
    }
}

#[async_trait]
impl ReportRepository for DbReport {
    async fn fetch_section_contents(
        &self,
        report_id: &str,
        section: &str,
    ) -> Result<Vec<SubsectionContent>, RepositoryError> {
        self.log_pool_state("Fetching section contents", report_id);

        let query_sql = r#"
            SELECT subsection, content
            FROM report_sections
            WHERE report_id = $1
                AND section = $2
            ORDER BY position ASC, subsection ASC
        "#;

        let rows = sqlx::query(query_sql)
            .bind(report_id)
            .bind(section)
            .fetch_all(&self.pool)
            .await?;

        let mut contents = Vec::with_capacity(rows.len());
        for row in rows {
            contents.push(SubsectionContent {
                title: row.try_get("subsection")?,
                content: row.try_get("content")?,
            });
        }
        Ok(contents)
    }

    async fn update_section_content(
        &self,
        report_id: &str,
        section: &str,
        subsection: &str,
        content: &str,
    ) -> Result<(), RepositoryError> {
        // New subsections go to the end of the section.
        let query_sql = r#"
            INSERT INTO report_sections (report_id, section, subsection, position, content)
            VALUES (
                $1, $2, $3,
                COALESCE((SELECT MAX(position) + 1 FROM report_sections WHERE report_id = $1 AND section = $2), 0),
                $4
            )
            ON CONFLICT (report_id, section, subsection)
            DO UPDATE SET content = EXCLUDED.content, updated_at = NOW()
        "#;

        let result = sqlx::query(query_sql)
            .bind(report_id)
            .bind(section)
            .bind(subsection)
            .bind(content)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            error!(
                "Failed to update subsection '{}' of section '{}' in report {}: {}",
                subsection, section, report_id, e
            );
            return Err(e.into());
        }
        Ok(())
    }

    async fn is_user_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 AS present FROM report_members WHERE report_id = $1 AND uid = $2")
            .bind(report_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn is_admin_in_report(&self, uid: &str, report_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT is_admin FROM report_members WHERE report_id = $1 AND uid = $2")
            .bind(report_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("is_admin")?),
            None => Ok(false),
        }
    }

    async fn write_logs(&self, report_id: &str, entries: &[LogEntry]) -> Result<(), RepositoryError> {
        if entries.is_empty() {
            return Ok(());
        }

        let (sql, values) = {
            let mut insert = Query::insert();
            insert.into_table(ReportLogs::Table).columns([
                ReportLogs::ReportId,
                ReportLogs::UserId,
                ReportLogs::Message,
                ReportLogs::CreatedAt,
            ]);
            for entry in entries {
                insert.values([
                    report_id.into(),
                    entry.user.clone().into(),
                    entry.message.clone().into(),
                    entry.timestamp.into(),
                ])?;
            }
            insert.build_sqlx(PostgresQueryBuilder)
        };
        sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_logs(&self, report_id: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        let (sql, values) = Query::select()
            .columns([ReportLogs::UserId, ReportLogs::Message, ReportLogs::CreatedAt])
            .from(ReportLogs::Table)
            .and_where(Expr::col(ReportLogs::ReportId).eq(report_id))
            .order_by(ReportLogs::CreatedAt, Order::Asc)
            .order_by(ReportLogs::Id, Order::Asc)
            .build_sqlx(PostgresQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp: DateTime<Utc> = row.try_get("created_at")?;
            entries.push(LogEntry {
                timestamp,
                user: row.try_get("user_id")?,
                message: row.try_get("message")?,
            });
        }
        Ok(entries)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

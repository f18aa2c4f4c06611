use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, Json};
use moka::future::Cache;
use tracing::{debug, error};

use crate::db::ReportRepository;
use crate::error::RepositoryError;
use crate::models::{ErrorResponse, Identity};

/// Role that unlocks service-wide endpoints such as diagnostics.
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Outsider,
    Member,
    Admin,
}

/// Report membership lookups, cached per (uid, report).
///
/// Only grants are cached, so a user added to a report gets in on the next try.
#[derive(Clone)]
pub struct ReportAccess {
    repo: Arc<dyn ReportRepository>,
    cache: Cache<(String, String), Membership>,
}

impl ReportAccess {
    pub fn new(repo: Arc<dyn ReportRepository>, ttl: Duration) -> Self {
        Self {
            repo,
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn membership(&self, uid: &str, report_id: &str) -> Result<Membership, RepositoryError> {
        let key = (uid.to_string(), report_id.to_string());
        if let Some(membership) = self.cache.get(&key).await {
            return Ok(membership);
        }

        let membership = if self.repo.is_admin_in_report(uid, report_id).await? {
            Membership::Admin
        } else if self.repo.is_user_in_report(uid, report_id).await? {
            Membership::Member
        } else {
            Membership::Outsider
        };
        debug!("Resolved membership of {} in report {}: {:?}", uid, report_id, membership);

        if membership != Membership::Outsider {
            self.cache.insert(key, membership).await;
        }
        Ok(membership)
    }
}

fn forbidden(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    ErrorResponse::reply(StatusCode::FORBIDDEN, message)
}

fn lookup_failed(e: RepositoryError) -> (StatusCode, Json<ErrorResponse>) {
    error!("Membership lookup failed: {}", e);
    ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Membership lookup failed")
}

pub async fn ensure_report_member(
    access: &ReportAccess,
    identity: &Identity,
    report_id: &str,
) -> Result<Membership, (StatusCode, Json<ErrorResponse>)> {
    match access.membership(&identity.uid, report_id).await.map_err(lookup_failed)? {
        Membership::Outsider => Err(forbidden("User is not a member of the report")),
        membership => Ok(membership),
    }
}

pub async fn ensure_report_admin(
    access: &ReportAccess,
    identity: &Identity,
    report_id: &str,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    match access.membership(&identity.uid, report_id).await.map_err(lookup_failed)? {
        Membership::Admin => Ok(()),
        _ => Err(forbidden("Report admin access required")),
    }
}

pub fn ensure_admin_role(identity: &Identity) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    if identity.has_role(ADMIN_ROLE) {
        return Ok(());
    }
    Err(forbidden("Admin access required"))
}

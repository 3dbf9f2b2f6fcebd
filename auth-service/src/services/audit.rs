//! Security audit trail.
//!
//! Writes are awaited but best-effort: a failed insert is logged and never fails
//! the operation that produced the event. High-severity events are also emitted
//! on the `security_alert` target for alerting pipelines.

use std::sync::Arc;
use uuid::Uuid;

use super::error::RepositoryError;
use super::repository::AuthRepository;
use crate::models::AuditLog;

/// Upper bound for audit queries.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuthRepository>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuthRepository>) -> Self {
        Self { repo }
    }

    pub async fn log(&self, entry: AuditLog) {
        if entry.is_high_severity() {
            tracing::warn!(
                target: "security_alert",
                event_type = %entry.event_type.as_str(),
                severity = %entry.severity.as_str(),
                user_id = ?entry.user_id,
                target_id = ?entry.target_id,
                details = %entry.details,
                "High severity security event"
            );
        }

        if let Err(e) = self.repo.insert_audit_log(&entry).await {
            tracing::error!(
                error = %e,
                event_type = %entry.event_type.as_str(),
                user_id = ?entry.user_id,
                "Failed to write audit log"
            );
        }
    }

    /// Newest first.
    pub async fn user_logs(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        self.repo
            .list_audit_logs_for_user(user_id, clamp_limit(limit))
            .await
    }

    /// Newest first.
    pub async fn recent_events(&self, limit: i64) -> Result<Vec<AuditLog>, RepositoryError> {
        self.repo.recent_audit_logs(clamp_limit(limit)).await
    }
}

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_AUDIT_QUERY_LIMIT)
}

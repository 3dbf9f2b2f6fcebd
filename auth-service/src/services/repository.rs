//! Storage seams for the auth core. `Database` and `InMemoryStore` implement them.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::error::RepositoryError;
use crate::models::{
    ActivationToken, ActivationTokenType, AuditLog, Department, FailedLoginOutcome,
    ProfileChanges, RefreshToken, Role, RoleName, User,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, RepositoryError>;

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, RepositoryError>;

    async fn find_department_by_id(
        &self,
        department_id: Uuid,
    ) -> Result<Option<Department>, RepositoryError>;

    /// LOCKED with an elapsed window becomes ACTIVE with a zeroed counter.
    /// Returns false when the account was not in that state.
    async fn unlock_expired(&self, user_id: Uuid, now: DateTime<Utc>)
        -> Result<bool, RepositoryError>;

    /// Atomic increment of the failure counter plus the lockout transition.
    async fn record_failed_login(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailedLoginOutcome, RepositoryError>;

    /// Clears the failure counter of an ACTIVE user. Returns false, changing nothing,
    /// when the account is no longer ACTIVE.
    async fn record_successful_login(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Fails with `Conflict` when the new email is taken, `NotFound` for unknown users.
    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), RepositoryError>;

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Revokes `old_id` and inserts `successor` in one unit. Returns false, inserting
    /// nothing, when `old_id` was already revoked.
    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        successor: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Revokes every live token of the family. Returns how many were revoked.
    async fn revoke_family(&self, family_id: Uuid, now: DateTime<Utc>)
        -> Result<u64, RepositoryError>;

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>)
        -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ActivationTokenRepository: Send + Sync {
    async fn insert_activation_token(&self, token: &ActivationToken)
        -> Result<(), RepositoryError>;

    async fn find_activation_token(
        &self,
        token_hash: &str,
        token_type: ActivationTokenType,
    ) -> Result<Option<ActivationToken>, RepositoryError>;

    /// Deletes tokens that expired before `cutoff`.
    async fn delete_stale_activation_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), RepositoryError>;

    /// Newest first.
    async fn list_audit_logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, RepositoryError>;

    /// Newest first.
    async fn recent_audit_logs(&self, limit: i64) -> Result<Vec<AuditLog>, RepositoryError>;
}

/// New credentials written by a password reset.
#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub password_hash: String,
    /// Newest first, already bounded.
    pub password_history: Vec<String>,
}

/// Every store the auth core needs, plus the multi-table units of work.
#[async_trait]
pub trait AuthRepository:
    UserRepository + RefreshTokenRepository + ActivationTokenRepository + AuditLogRepository
{
    async fn health_check(&self) -> Result<(), RepositoryError>;

    /// Consumes the activation token and activates the user with the given hash.
    /// Returns false, changing nothing, when the token was already used.
    async fn complete_activation(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Consumes the reset token, stores the new password and history, clears the
    /// lockout state and revokes every refresh token of the user.
    /// Returns false, changing nothing, when the token was already used.
    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        change: &PasswordChange,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

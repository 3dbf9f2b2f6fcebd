//! PostgreSQL implementation of the auth repositories.
//!
//! Rows are read into `*Row` structs and converted into domain models, so status
//! and type columns are parsed in exactly one place.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::error::RepositoryError;
use super::repository::{
    ActivationTokenRepository, AuditLogRepository, AuthRepository, PasswordChange,
    RefreshTokenRepository, UserRepository,
};
use crate::models::{
    ActivationToken, ActivationTokenType, AuditLog, Department, FailedLoginOutcome,
    ProfileChanges, RefreshToken, Role, RoleName, User, UserStatus,
};

const USER_COLUMNS: &str = r#"
    id, email, first_name, last_name, password_hash, role_id, department_id, status,
    last_login, failed_login_attempts, account_locked_until, lockout_count_24h,
    last_lockout_reset, password_changed_at, password_history, mfa_enabled, created_by,
    created_at, updated_at
"#;

const REFRESH_TOKEN_COLUMNS: &str = r#"
    id, user_id, token_hash, family_id, expires_at, revoked_at, ip_address, user_agent, created_at
"#;

const ACTIVATION_TOKEN_COLUMNS: &str = r#"
    id, user_id, token_hash, token_type, expires_at, used_at, created_at
"#;

const AUDIT_LOG_COLUMNS: &str = r#"
    id, event_type, user_id, target_id, details, ip_address, user_agent, severity, timestamp
"#;

fn corrupt(column: &str, err: String) -> RepositoryError {
    RepositoryError::Database(anyhow::anyhow!("Invalid {} value in database: {}", column, err))
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role_id: Uuid,
    department_id: Option<Uuid>,
    status: String,
    last_login: Option<DateTime<Utc>>,
    failed_login_attempts: i32,
    account_locked_until: Option<DateTime<Utc>>,
    lockout_count_24h: i32,
    last_lockout_reset: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
    password_history: Vec<String>,
    mfa_enabled: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            password_hash: row.password_hash,
            role_id: row.role_id,
            department_id: row.department_id,
            status: row.status.parse().map_err(|e| corrupt("users.status", e))?,
            last_login: row.last_login,
            failed_login_attempts: row.failed_login_attempts,
            account_locked_until: row.account_locked_until,
            lockout_count_24h: row.lockout_count_24h,
            last_lockout_reset: row.last_lockout_reset,
            password_changed_at: row.password_changed_at,
            password_history: row.password_history,
            mfa_enabled: row.mfa_enabled,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
}

impl TryFrom<RoleRow> for Role {
    type Error = RepositoryError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role {
            id: row.id,
            name: row.name.parse().map_err(|e| corrupt("roles.name", e))?,
            description: row.description,
        })
    }
}

#[derive(Debug, FromRow)]
struct DepartmentRow {
    id: Uuid,
    name: String,
}

impl From<DepartmentRow> for Department {
    fn from(row: DepartmentRow) -> Self {
        Department {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, FromRow)]
struct FailedLoginRow {
    failed_login_attempts: i32,
    status: String,
    account_locked_until: Option<DateTime<Utc>>,
    lockout_count_24h: i32,
    newly_locked: bool,
}

impl TryFrom<FailedLoginRow> for FailedLoginOutcome {
    type Error = RepositoryError;

    fn try_from(row: FailedLoginRow) -> Result<Self, Self::Error> {
        Ok(FailedLoginOutcome {
            failed_login_attempts: row.failed_login_attempts,
            status: row
                .status
                .parse::<UserStatus>()
                .map_err(|e| corrupt("users.status", e))?,
            account_locked_until: row.account_locked_until,
            lockout_count_24h: row.lockout_count_24h,
            newly_locked: row.newly_locked,
        })
    }
}

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    family_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            family_id: row.family_id,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ActivationTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    token_type: String,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivationTokenRow> for ActivationToken {
    type Error = RepositoryError;

    fn try_from(row: ActivationTokenRow) -> Result<Self, Self::Error> {
        Ok(ActivationToken {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            token_type: row
                .token_type
                .parse()
                .map_err(|e| corrupt("activation_tokens.token_type", e))?,
            expires_at: row.expires_at,
            used_at: row.used_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: Uuid,
    event_type: String,
    user_id: Option<Uuid>,
    target_id: Option<Uuid>,
    details: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    severity: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AuditLogRow> for AuditLog {
    type Error = RepositoryError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            id: row.id,
            event_type: row
                .event_type
                .parse()
                .map_err(|e| corrupt("audit_logs.event_type", e))?,
            user_id: row.user_id,
            target_id: row.target_id,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            severity: row
                .severity
                .parse()
                .map_err(|e| corrupt("audit_logs.severity", e))?,
            timestamp: row.timestamp,
        })
    }
}

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database wrapper from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn insert_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, first_name, last_name, password_hash, role_id, department_id,
                status, failed_login_attempts, lockout_count_24h, password_changed_at,
                password_history, mfa_enabled, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(user.department_id)
        .bind(user.status.as_str())
        .bind(user.failed_login_attempts)
        .bind(user.lockout_count_24h)
        .bind(user.password_changed_at)
        .bind(&user.password_history)
        .bind(user.mfa_enabled)
        .bind(user.created_by)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, RepositoryError> {
        sqlx::query_as::<_, RoleRow>("SELECT id, name, description FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Role::try_from)
            .transpose()
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, RepositoryError> {
        sqlx::query_as::<_, RoleRow>("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Role::try_from)
            .transpose()
    }

    async fn find_department_by_id(
        &self,
        department_id: Uuid,
    ) -> Result<Option<Department>, RepositoryError> {
        let row =
            sqlx::query_as::<_, DepartmentRow>("SELECT id, name FROM departments WHERE id = $1")
                .bind(department_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Department::from))
    }

    async fn unlock_expired(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = 'ACTIVE',
                failed_login_attempts = 0,
                account_locked_until = NULL,
                updated_at = $2
            WHERE id = $1
              AND status = 'LOCKED'
              AND (account_locked_until IS NULL OR account_locked_until <= $2)
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_failed_login(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailedLoginOutcome, RepositoryError> {
        // The row lock serializes concurrent failures; only the update that crosses
        // the threshold from a non-LOCKED state reports newly_locked.
        let row = sqlx::query_as::<_, FailedLoginRow>(
            r#"
            WITH current AS (
                SELECT id,
                       status AS previous_status,
                       failed_login_attempts + 1 AS attempts,
                       (last_lockout_reset IS NOT NULL
                        AND $4 - last_lockout_reset < INTERVAL '24 hours') AS window_open
                FROM users
                WHERE id = $1
                FOR UPDATE
            ),
            decision AS (
                SELECT id, attempts, window_open,
                       (attempts >= $2 AND previous_status <> 'LOCKED') AS lock_now
                FROM current
            )
            UPDATE users u
            SET failed_login_attempts = d.attempts,
                status = CASE WHEN d.lock_now THEN 'LOCKED' ELSE u.status END,
                account_locked_until =
                    CASE WHEN d.lock_now THEN $3 ELSE u.account_locked_until END,
                lockout_count_24h = CASE
                    WHEN NOT d.lock_now THEN u.lockout_count_24h
                    WHEN d.window_open THEN u.lockout_count_24h + 1
                    ELSE 1
                END,
                last_lockout_reset =
                    CASE WHEN d.lock_now AND NOT d.window_open THEN $4 ELSE u.last_lockout_reset END,
                updated_at = $4
            FROM decision d
            WHERE u.id = d.id
            RETURNING u.failed_login_attempts, u.status, u.account_locked_until,
                      u.lockout_count_24h, d.lock_now AS newly_locked
            "#,
        )
        .bind(user_id)
        .bind(max_attempts)
        .bind(now + lock_duration)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))?;

        FailedLoginOutcome::try_from(row)
    }

    async fn record_successful_login(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, last_login = $2, updated_at = $2
            WHERE id = $1 AND status = 'ACTIVE'
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .bind(&changes.email)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))?;
        User::try_from(row)
    }
}

#[async_trait]
impl RefreshTokenRepository for Database {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), RepositoryError> {
        insert_refresh_token(&self.pool, token).await
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM refresh_tokens WHERE token_hash = $1",
            REFRESH_TOKEN_COLUMNS
        );
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RefreshToken::from))
    }

    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        successor: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE id = $1 AND revoked_at IS NULL",
        )
        .bind(old_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if revoked.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_refresh_token(&mut *tx, successor).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE family_id = $1 AND revoked_at IS NULL",
        )
        .bind(family_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert_refresh_token<'e, E>(executor: E, token: &RefreshToken) -> Result<(), RepositoryError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (
            id, user_id, token_hash, family_id, expires_at, revoked_at, ip_address, user_agent, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(token.id)
    .bind(token.user_id)
    .bind(&token.token_hash)
    .bind(token.family_id)
    .bind(token.expires_at)
    .bind(token.revoked_at)
    .bind(&token.ip_address)
    .bind(&token.user_agent)
    .bind(token.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl ActivationTokenRepository for Database {
    async fn insert_activation_token(
        &self,
        token: &ActivationToken,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO activation_tokens (id, user_id, token_hash, token_type, expires_at, used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.token_type.as_str())
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_activation_token(
        &self,
        token_hash: &str,
        token_type: ActivationTokenType,
    ) -> Result<Option<ActivationToken>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM activation_tokens WHERE token_hash = $1 AND token_type = $2",
            ACTIVATION_TOKEN_COLUMNS
        );
        sqlx::query_as::<_, ActivationTokenRow>(&sql)
            .bind(token_hash)
            .bind(token_type.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(ActivationToken::try_from)
            .transpose()
    }

    async fn delete_stale_activation_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM activation_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditLogRepository for Database {
    async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, event_type, user_id, target_id, details, ip_address, user_agent, severity, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(log.id)
        .bind(log.event_type.as_str())
        .bind(log.user_id)
        .bind(log.target_id)
        .bind(&log.details)
        .bind(&log.ip_address)
        .bind(&log.user_agent)
        .bind(log.severity.as_str())
        .bind(log.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM audit_logs WHERE user_id = $1 ORDER BY timestamp DESC LIMIT $2",
            AUDIT_LOG_COLUMNS
        );
        sqlx::query_as::<_, AuditLogRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AuditLog::try_from)
            .collect()
    }

    async fn recent_audit_logs(&self, limit: i64) -> Result<Vec<AuditLog>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM audit_logs ORDER BY timestamp DESC LIMIT $1",
            AUDIT_LOG_COLUMNS
        );
        sqlx::query_as::<_, AuditLogRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AuditLog::try_from)
            .collect()
    }
}

#[async_trait]
impl AuthRepository for Database {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        crate::db::health_check(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            RepositoryError::from(e)
        })
    }

    async fn complete_activation(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !consume_activation_token(&mut tx, token_id, user_id, now).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, status = 'ACTIVE', password_changed_at = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        change: &PasswordChange,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if !consume_activation_token(&mut tx, token_id, user_id, now).await? {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2,
                password_history = $3,
                password_changed_at = $4,
                failed_login_attempts = 0,
                account_locked_until = NULL,
                status = 'ACTIVE',
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(&change.password_hash)
        .bind(&change.password_history)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

async fn consume_activation_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r#"
        UPDATE activation_tokens
        SET used_at = $3
        WHERE id = $1 AND user_id = $2 AND used_at IS NULL AND expires_at > $3
        "#,
    )
    .bind(token_id)
    .bind(user_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientInfo, NewUser};
    use secrecy::Secret;

    async fn database() -> Database {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/internship_auth_test".to_string());
        let pool = crate::db::create_pool(&crate::config::DatabaseConfig {
            url: Secret::new(url),
            max_connections: 5,
            min_connections: 1,
        })
        .await
        .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        Database::new(pool)
    }

    async fn candidate(db: &Database) -> User {
        let role = db
            .find_role_by_name(RoleName::Candidate)
            .await
            .unwrap()
            .unwrap();
        let user = User::new(NewUser {
            email: format!("pg-{}@example.com", Uuid::new_v4()),
            first_name: "Pat".to_string(),
            last_name: "Gres".to_string(),
            password_hash: "hash".to_string(),
            role_id: role.id,
            department_id: None,
            status: UserStatus::Active,
            password_changed_at: Some(Utc::now()),
            created_by: None,
        });
        db.insert_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn failed_logins_lock_exactly_once() {
        let db = database().await;
        let user = candidate(&db).await;
        let now = Utc::now();

        let mut newly_locked = 0;
        for _ in 0..6 {
            let outcome = db
                .record_failed_login(user.id, 5, Duration::minutes(30), now)
                .await
                .unwrap();
            if outcome.newly_locked {
                newly_locked += 1;
            }
        }

        let stored = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(newly_locked, 1);
        assert_eq!(stored.failed_login_attempts, 6);
        assert_eq!(stored.status, UserStatus::Locked);
        assert_eq!(stored.lockout_count_24h, 1);

        let later = now + Duration::minutes(31);
        assert!(db.unlock_expired(user.id, later).await.unwrap());
        let unlocked = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(unlocked.status, UserStatus::Active);
        assert_eq!(unlocked.failed_login_attempts, 0);
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn successful_login_skips_locked_row() {
        let db = database().await;
        let user = candidate(&db).await;
        let now = Utc::now();
        for _ in 0..5 {
            db.record_failed_login(user.id, 5, Duration::minutes(30), now)
                .await
                .unwrap();
        }

        assert!(!db.record_successful_login(user.id, now).await.unwrap());
        let stored = db.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Locked);
        assert_eq!(stored.failed_login_attempts, 5);
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn rotation_of_revoked_token_inserts_nothing() {
        let db = database().await;
        let user = candidate(&db).await;
        let client = ClientInfo::default();

        let first = RefreshToken::new(user.id, "first", 7, &client);
        db.insert_refresh_token(&first).await.unwrap();

        let second = RefreshToken::in_family(user.id, first.family_id, "second", 7, &client);
        assert!(db
            .rotate_refresh_token(first.id, &second, Utc::now())
            .await
            .unwrap());

        let third = RefreshToken::in_family(user.id, first.family_id, "third", 7, &client);
        assert!(!db
            .rotate_refresh_token(first.id, &third, Utc::now())
            .await
            .unwrap());
        assert!(db
            .find_refresh_token_by_hash(&third.token_hash)
            .await
            .unwrap()
            .is_none());

        assert_eq!(db.revoke_family(first.family_id, Utc::now()).await.unwrap(), 1);
    }
}

//! Mutex-guarded in-memory store. Backs tests and local runs without Postgres.
//! One lock covers every table so multi-row operations are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
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

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Role>,
    departments: HashMap<Uuid, Department>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    activation_tokens: HashMap<Uuid, ActivationToken>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn revoke_where(&mut self, now: DateTime<Utc>, pred: impl Fn(&RefreshToken) -> bool) -> u64 {
        let mut revoked = 0;
        for token in self.refresh_tokens.values_mut() {
            if token.revoked_at.is_none() && pred(token) {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }

    /// Marks a token used if still unused and unexpired.
    fn consume_token(&mut self, token_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.activation_tokens.get_mut(&token_id) {
            Some(token)
                if token.user_id == user_id && token.used_at.is_none() && token.expires_at > now =>
            {
                token.used_at = Some(now);
                true
            }
            _ => false,
        }
    }
}

pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_audit_writes: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with every role seeded.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for name in RoleName::ALL {
            let role = Role::new(name, None);
            tables.roles.insert(role.id, role);
        }
        Self {
            tables: Mutex::new(tables),
            fail_audit_writes: AtomicBool::new(false),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|e| RepositoryError::Database(anyhow::anyhow!("Store mutex poisoned: {}", e)))
    }

    pub fn add_department(&self, name: &str) -> Result<Department, RepositoryError> {
        let department = Department::new(name);
        self.tables()?
            .departments
            .insert(department.id, department.clone());
        Ok(department)
    }

    /// Makes audit inserts fail, to exercise best-effort auditing.
    #[cfg(any(test, feature = "test-support"))]
    pub fn set_fail_audit_writes(&self, fail: bool) {
        self.fail_audit_writes.store(fail, Ordering::SeqCst);
    }

    /// Applies `f` to a stored user. Returns false for unknown ids.
    #[cfg(any(test, feature = "test-support"))]
    pub fn modify_user(&self, user_id: Uuid, f: impl FnOnce(&mut User)) -> bool {
        match self.tables() {
            Ok(mut tables) => tables.users.get_mut(&user_id).map(f).is_some(),
            Err(_) => false,
        }
    }

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.tables()
            .ok()
            .and_then(|t| t.users.get(&user_id).cloned())
    }

    /// Moves an activation token's expiry into the past.
    #[cfg(any(test, feature = "test-support"))]
    pub fn expire_activation_token(&self, token_id: Uuid) -> bool {
        match self.tables() {
            Ok(mut tables) => match tables.activation_tokens.get_mut(&token_id) {
                Some(token) => {
                    token.expires_at = Utc::now() - Duration::seconds(1);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn refresh_tokens(&self) -> Vec<RefreshToken> {
        self.tables()
            .map(|t| t.refresh_tokens.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn activation_tokens(&self) -> Vec<ActivationToken> {
        self.tables()
            .map(|t| t.activation_tokens.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Oldest first.
    pub fn audit_logs(&self) -> Vec<AuditLog> {
        self.tables()
            .map(|t| t.audit_logs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.email_taken(&user.email, None) {
            return Err(RepositoryError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, RepositoryError> {
        Ok(self
            .tables()?
            .roles
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, RepositoryError> {
        Ok(self.tables()?.roles.get(&role_id).cloned())
    }

    async fn find_department_by_id(
        &self,
        department_id: Uuid,
    ) -> Result<Option<Department>, RepositoryError> {
        Ok(self.tables()?.departments.get(&department_id).cloned())
    }

    async fn unlock_expired(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if !user.lock_expired_at(now) {
            return Ok(false);
        }
        user.status = UserStatus::Active;
        user.failed_login_attempts = 0;
        user.account_locked_until = None;
        user.updated_at = now;
        Ok(true)
    }

    async fn record_failed_login(
        &self,
        user_id: Uuid,
        max_attempts: i32,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<FailedLoginOutcome, RepositoryError> {
        let mut tables = self.tables()?;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))?;
        Ok(user.register_failed_login(max_attempts, lock_duration, now))
    }

    async fn record_successful_login(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        let Some(user) = tables
            .users
            .get_mut(&user_id)
            .filter(|u| u.status == UserStatus::Active)
        else {
            return Ok(false);
        };
        user.failed_login_attempts = 0;
        user.last_login = Some(now);
        user.updated_at = now;
        Ok(true)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        if let Some(email) = &changes.email {
            if tables.email_taken(email, Some(user_id)) {
                return Err(RepositoryError::Conflict(format!(
                    "email {} already registered",
                    email
                )));
            }
        }
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", user_id)))?;
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &changes.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &changes.last_name {
            user.last_name = last_name.clone();
        }
        user.updated_at = now;
        Ok(user.clone())
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), RepositoryError> {
        self.tables()?
            .refresh_tokens
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        Ok(self
            .tables()?
            .refresh_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        old_id: Uuid,
        successor: &RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        match tables.refresh_tokens.get_mut(&old_id) {
            Some(old) if old.revoked_at.is_none() => old.revoked_at = Some(now),
            _ => return Ok(false),
        }
        tables
            .refresh_tokens
            .insert(successor.id, successor.clone());
        Ok(true)
    }

    async fn revoke_family(
        &self,
        family_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(self
            .tables()?
            .revoke_where(now, |t| t.family_id == family_id))
    }

    async fn delete_expired_refresh_tokens(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl ActivationTokenRepository for InMemoryStore {
    async fn insert_activation_token(
        &self,
        token: &ActivationToken,
    ) -> Result<(), RepositoryError> {
        self.tables()?
            .activation_tokens
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn find_activation_token(
        &self,
        token_hash: &str,
        token_type: ActivationTokenType,
    ) -> Result<Option<ActivationToken>, RepositoryError> {
        Ok(self
            .tables()?
            .activation_tokens
            .values()
            .find(|t| t.token_hash == token_hash && t.token_type == token_type)
            .cloned())
    }

    async fn delete_stale_activation_tokens(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.tables()?;
        let before = tables.activation_tokens.len();
        tables.activation_tokens.retain(|_, t| t.expires_at >= cutoff);
        Ok((before - tables.activation_tokens.len()) as u64)
    }
}

#[async_trait]
impl AuditLogRepository for InMemoryStore {
    async fn insert_audit_log(&self, log: &AuditLog) -> Result<(), RepositoryError> {
        if self.fail_audit_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(anyhow::anyhow!(
                "audit table unavailable"
            )));
        }
        self.tables()?.audit_logs.push(log.clone());
        Ok(())
    }

    async fn list_audit_logs_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLog>, RepositoryError> {
        let tables = self.tables()?;
        let mut logs: Vec<AuditLog> = tables
            .audit_logs
            .iter()
            .rev()
            .filter(|log| log.user_id == Some(user_id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }

    async fn recent_audit_logs(&self, limit: i64) -> Result<Vec<AuditLog>, RepositoryError> {
        let tables = self.tables()?;
        // Reverse insertion order breaks timestamp ties newest first.
        let mut logs: Vec<AuditLog> = tables.audit_logs.iter().rev().cloned().collect();
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}

#[async_trait]
impl AuthRepository for InMemoryStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.tables().map(|_| ())
    }

    async fn complete_activation(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) || !tables.consume_token(token_id, user_id, now) {
            return Ok(false);
        }
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
            user.status = UserStatus::Active;
            user.password_changed_at = Some(now);
            user.updated_at = now;
        }
        Ok(true)
    }

    async fn complete_password_reset(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        change: &PasswordChange,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) || !tables.consume_token(token_id, user_id, now) {
            return Ok(false);
        }
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.password_hash = change.password_hash.clone();
            user.password_history = change.password_history.clone();
            user.password_changed_at = Some(now);
            user.failed_login_attempts = 0;
            user.account_locked_until = None;
            user.status = UserStatus::Active;
            user.updated_at = now;
        }
        tables.revoke_where(now, |t| t.user_id == user_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientInfo, NewUser};

    async fn store_with_user() -> (InMemoryStore, User) {
        let store = InMemoryStore::new();
        let role = store
            .find_role_by_name(RoleName::Candidate)
            .await
            .unwrap()
            .unwrap();
        let user = User::new(NewUser {
            email: "jane@example.com".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            password_hash: "hash".to_string(),
            role_id: role.id,
            department_id: None,
            status: UserStatus::Active,
            password_changed_at: None,
            created_by: None,
        });
        store.insert_user(&user).await.unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn seeds_every_role() {
        let store = InMemoryStore::new();
        for name in RoleName::ALL {
            assert!(store.find_role_by_name(name).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (store, user) = store_with_user().await;
        let mut twin = user.clone();
        twin.id = Uuid::new_v4();
        assert!(matches!(
            store.insert_user(&twin).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn successful_login_leaves_locked_account_untouched() {
        let (store, user) = store_with_user().await;
        let now = Utc::now();
        for _ in 0..5 {
            store
                .record_failed_login(user.id, 5, Duration::minutes(30), now)
                .await
                .unwrap();
        }

        assert!(!store.record_successful_login(user.id, now).await.unwrap());
        let locked = store.user(user.id).unwrap();
        assert_eq!(locked.status, UserStatus::Locked);
        assert_eq!(locked.failed_login_attempts, 5);
        assert!(locked.last_login.is_none());
    }

    #[tokio::test]
    async fn successful_login_resets_counter_of_active_account() {
        let (store, user) = store_with_user().await;
        let now = Utc::now();
        store
            .record_failed_login(user.id, 5, Duration::minutes(30), now)
            .await
            .unwrap();

        assert!(store.record_successful_login(user.id, now).await.unwrap());
        let active = store.user(user.id).unwrap();
        assert_eq!(active.failed_login_attempts, 0);
        assert_eq!(active.last_login, Some(now));
    }

    #[tokio::test]
    async fn rotation_of_revoked_token_inserts_nothing() {
        let (store, user) = store_with_user().await;
        let now = Utc::now();
        let t0 = RefreshToken::new(user.id, "t0", 7, &ClientInfo::default());
        store.insert_refresh_token(&t0).await.unwrap();

        let t1 = RefreshToken::in_family(user.id, t0.family_id, "t1", 7, &ClientInfo::default());
        assert!(store.rotate_refresh_token(t0.id, &t1, now).await.unwrap());

        let t2 = RefreshToken::in_family(user.id, t0.family_id, "t2", 7, &ClientInfo::default());
        assert!(!store.rotate_refresh_token(t0.id, &t2, now).await.unwrap());
        assert_eq!(store.refresh_tokens().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_failures_are_all_counted() {
        let (store, user) = store_with_user().await;
        let store = std::sync::Arc::new(store);
        let now = Utc::now();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .record_failed_login(user.id, 5, Duration::minutes(30), now)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut newly_locked = 0;
        for handle in handles {
            if handle.await.unwrap().newly_locked {
                newly_locked += 1;
            }
        }

        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_login_attempts, 10);
        assert_eq!(stored.status, UserStatus::Locked);
        assert_eq!(newly_locked, 1);
    }

    #[tokio::test]
    async fn activation_token_is_consumed_once() {
        let (store, user) = store_with_user().await;
        let token = ActivationToken::new(
            user.id,
            "secret",
            ActivationTokenType::Activation,
            Duration::hours(48),
        );
        store.insert_activation_token(&token).await.unwrap();

        let now = Utc::now();
        assert!(store
            .complete_activation(token.id, user.id, "new-hash", now)
            .await
            .unwrap());
        assert!(!store
            .complete_activation(token.id, user.id, "other-hash", now)
            .await
            .unwrap());

        let stored = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_rows() {
        let (store, user) = store_with_user().await;
        let now = Utc::now();
        let mut expired = RefreshToken::new(user.id, "old", 7, &ClientInfo::default());
        expired.expires_at = now - Duration::days(1);
        let live = RefreshToken::new(user.id, "new", 7, &ClientInfo::default());
        store.insert_refresh_token(&expired).await.unwrap();
        store.insert_refresh_token(&live).await.unwrap();

        assert_eq!(store.delete_expired_refresh_tokens(now).await.unwrap(), 1);
        assert_eq!(store.refresh_tokens()[0].id, live.id);
    }
}

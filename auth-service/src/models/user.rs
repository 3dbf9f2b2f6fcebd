//! User aggregate: identity plus the security state mutated by every login attempt.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::RoleName;

/// Number of previous password hashes kept for reuse checks.
pub const PASSWORD_HISTORY_LIMIT: usize = 5;

/// Window over which `lockout_count_24h` accumulates.
pub const LOCKOUT_COUNT_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
    Locked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "PENDING",
            UserStatus::Active => "ACTIVE",
            UserStatus::Suspended => "SUSPENDED",
            UserStatus::Locked => "LOCKED",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(UserStatus::Pending),
            "ACTIVE" => Ok(UserStatus::Active),
            "SUSPENDED" => Ok(UserStatus::Suspended),
            "LOCKED" => Ok(UserStatus::Locked),
            _ => Err(format!("Unknown user status: {}", s)),
        }
    }
}

/// User entity. Role and department are referenced by id only.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role_id: Uuid,
    pub department_id: Option<Uuid>,
    pub status: UserStatus,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_login_attempts: i32,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub lockout_count_24h: i32,
    pub last_lockout_reset: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    /// Newest first, at most `PASSWORD_HISTORY_LIMIT` entries.
    pub password_history: Vec<String>,
    pub mfa_enabled: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&new_user.email),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            role_id: new_user.role_id,
            department_id: new_user.department_id,
            status: new_user.status,
            last_login: None,
            failed_login_attempts: 0,
            account_locked_until: None,
            lockout_count_24h: 0,
            last_lockout_reset: None,
            password_changed_at: new_user.password_changed_at,
            password_history: Vec::new(),
            mfa_enabled: false,
            created_by: new_user.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// LOCKED with an unlock time still in the future.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.status == UserStatus::Locked
            && self.account_locked_until.is_some_and(|until| until > now)
    }

    /// LOCKED but the window has passed (or was never recorded).
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == UserStatus::Locked && !self.is_locked_at(now)
    }

    /// History after replacing the current hash: current hash first, bounded.
    pub fn history_with_current(&self) -> Vec<String> {
        let mut history = Vec::with_capacity(PASSWORD_HISTORY_LIMIT);
        history.push(self.password_hash.clone());
        history.extend(
            self.password_history
                .iter()
                .take(PASSWORD_HISTORY_LIMIT - 1)
                .cloned(),
        );
        history
    }

    /// Applies one failed attempt to in-memory state and reports the outcome.
    pub fn register_failed_login(
        &mut self,
        max_attempts: i32,
        lock_duration: Duration,
        now: DateTime<Utc>,
    ) -> FailedLoginOutcome {
        let previous_status = self.status;
        self.failed_login_attempts += 1;

        let newly_locked =
            self.failed_login_attempts >= max_attempts && previous_status != UserStatus::Locked;

        if newly_locked {
            self.status = UserStatus::Locked;
            self.account_locked_until = Some(now + lock_duration);
            let window_open = self.last_lockout_reset.is_some_and(|start| {
                now - start < Duration::hours(LOCKOUT_COUNT_WINDOW_HOURS)
            });
            if window_open {
                self.lockout_count_24h += 1;
            } else {
                self.lockout_count_24h = 1;
                self.last_lockout_reset = Some(now);
            }
        }
        self.updated_at = now;

        FailedLoginOutcome {
            failed_login_attempts: self.failed_login_attempts,
            status: self.status,
            account_locked_until: self.account_locked_until,
            lockout_count_24h: self.lockout_count_24h,
            newly_locked,
        }
    }
}

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role_id: Uuid,
    pub department_id: Option<Uuid>,
    pub status: UserStatus,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

/// State after a failed login was recorded atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLoginOutcome {
    pub failed_login_attempts: i32,
    pub status: UserStatus,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub lockout_count_24h: i32,
    /// True only for the attempt that moved the account into LOCKED.
    pub newly_locked: bool,
}

/// Mutable profile fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    #[schema(example = "jane.doe@example.com")]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: RoleName,
    /// Department name, when the user belongs to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
}

impl UserProfile {
    pub fn from_parts(user: &User, role: RoleName, department: Option<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role,
            department,
            last_login: user.last_login,
            mfa_enabled: user.mfa_enabled,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

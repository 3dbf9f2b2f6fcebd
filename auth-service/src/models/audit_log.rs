use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::refresh_token::ClientInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    UserSignup,
    AccountCreated,
    AccountActivated,
    UserLogin,
    LoginFailed,
    AccountLocked,
    UserLogout,
    TokenReuseDetected,
    PasswordResetRequest,
    PasswordChanged,
    ProfileUpdated,
    AccountSuspended,
    MultipleFailedLogins,
    UnauthorizedAccessAttempt,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 14] = [
        AuditEventType::UserSignup,
        AuditEventType::AccountCreated,
        AuditEventType::AccountActivated,
        AuditEventType::UserLogin,
        AuditEventType::LoginFailed,
        AuditEventType::AccountLocked,
        AuditEventType::UserLogout,
        AuditEventType::TokenReuseDetected,
        AuditEventType::PasswordResetRequest,
        AuditEventType::PasswordChanged,
        AuditEventType::ProfileUpdated,
        AuditEventType::AccountSuspended,
        AuditEventType::MultipleFailedLogins,
        AuditEventType::UnauthorizedAccessAttempt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::UserSignup => "USER_SIGNUP",
            AuditEventType::AccountCreated => "ACCOUNT_CREATED",
            AuditEventType::AccountActivated => "ACCOUNT_ACTIVATED",
            AuditEventType::UserLogin => "USER_LOGIN",
            AuditEventType::LoginFailed => "LOGIN_FAILED",
            AuditEventType::AccountLocked => "ACCOUNT_LOCKED",
            AuditEventType::UserLogout => "USER_LOGOUT",
            AuditEventType::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
            AuditEventType::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            AuditEventType::PasswordChanged => "PASSWORD_CHANGED",
            AuditEventType::ProfileUpdated => "PROFILE_UPDATED",
            AuditEventType::AccountSuspended => "ACCOUNT_SUSPENDED",
            AuditEventType::MultipleFailedLogins => "MULTIPLE_FAILED_LOGINS",
            AuditEventType::UnauthorizedAccessAttempt => "UNAUTHORIZED_ACCESS_ATTEMPT",
        }
    }

    /// Events that go to the security alert channel regardless of severity.
    pub fn is_high_severity(&self) -> bool {
        matches!(
            self,
            AuditEventType::AccountSuspended
                | AuditEventType::MultipleFailedLogins
                | AuditEventType::UnauthorizedAccessAttempt
                | AuditEventType::TokenReuseDetected
        )
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEventType::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Unknown audit event type: {}", s))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub event_type: AuditEventType,
    /// Actor, when known.
    pub user_id: Option<Uuid>,
    /// Subject of the action when it differs from the actor.
    pub target_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    #[schema(example = "127.0.0.1")]
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            user_id: None,
            target_id: None,
            details: serde_json::Value::Object(Default::default()),
            ip_address: None,
            user_agent: None,
            severity: Severity::Info,
            timestamp: Utc::now(),
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn target(mut self, target_id: Uuid) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }

    pub fn is_high_severity(&self) -> bool {
        self.event_type.is_high_severity() || self.severity == Severity::Critical
    }
}

use chrono::{DateTime, SecondsFormat, Utc};
use service_core::error::AppError;
use thiserror::Error;

/// Failures raised by a storage backend.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(anyhow::Error::new(err)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked until {}", .until.to_rfc3339_opts(SecondsFormat::Millis, true))]
    AccountLocked { until: DateTime<Utc> },

    #[error("Account is suspended")]
    AccountSuspended,

    #[error("Account is not activated")]
    AccountNotActivated,

    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    #[error("User not found or inactive")]
    InactiveUser,

    #[error("Invalid or expired activation token")]
    InvalidActivationToken,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("{}", .0.join(", "))]
    PasswordPolicy(Vec<String>),

    #[error("Cannot reuse recent passwords")]
    PasswordReused,

    #[error("User with this email already exists")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid role")]
    InvalidRole,

    #[error("Department is required for DEPT_CHIEF role")]
    DepartmentRequired,

    #[error("Invalid department")]
    InvalidDepartment,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Repository(RepositoryError::Conflict(e)) => {
                AppError::Conflict(anyhow::anyhow!(e))
            }
            ServiceError::Repository(RepositoryError::NotFound(e)) => {
                AppError::NotFound(anyhow::anyhow!(e))
            }
            ServiceError::Repository(RepositoryError::Database(e)) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            e @ ServiceError::AccountLocked { .. } => AppError::Locked(e.to_string()),
            e @ (ServiceError::InvalidCredentials
            | ServiceError::AccountSuspended
            | ServiceError::AccountNotActivated
            | ServiceError::InvalidRefreshToken
            | ServiceError::InactiveUser
            | ServiceError::Unauthorized(_)) => AppError::AuthError(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::InvalidActivationToken
            | ServiceError::InvalidResetToken
            | ServiceError::PasswordPolicy(_)
            | ServiceError::PasswordReused
            | ServiceError::InvalidRole
            | ServiceError::DepartmentRequired
            | ServiceError::InvalidDepartment) => {
                AppError::BadRequest(anyhow::anyhow!(e.to_string()))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("User with this email already exists"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::Forbidden(e) => AppError::Forbidden(anyhow::anyhow!(e)),
        }
    }
}

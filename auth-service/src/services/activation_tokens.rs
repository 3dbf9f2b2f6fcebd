use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::error::RepositoryError;
use super::repository::AuthRepository;
use crate::config::TokenConfig;
use crate::models::{ActivationToken, ActivationTokenType};
use crate::utils::{generate_secure_token, hash_token};

/// Expired tokens are kept this long before cleanup deletes them.
const STALE_TOKEN_RETENTION_DAYS: i64 = 7;

/// Plaintext secret handed to the caller once. Only its hash is persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Single-use tokens for account activation and password reset.
#[derive(Clone)]
pub struct ActivationTokenService {
    repo: Arc<dyn AuthRepository>,
    activation_expiry: Duration,
    password_reset_expiry: Duration,
}

impl ActivationTokenService {
    pub fn new(repo: Arc<dyn AuthRepository>, config: &TokenConfig) -> Self {
        Self {
            repo,
            activation_expiry: Duration::hours(config.activation_expiry_hours),
            password_reset_expiry: Duration::hours(config.password_reset_expiry_hours),
        }
    }

    fn expiry_for(&self, token_type: ActivationTokenType) -> Duration {
        match token_type {
            ActivationTokenType::Activation => self.activation_expiry,
            ActivationTokenType::PasswordReset => self.password_reset_expiry,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        token_type: ActivationTokenType,
    ) -> Result<IssuedToken, RepositoryError> {
        let token = generate_secure_token();
        let record = ActivationToken::new(user_id, &token, token_type, self.expiry_for(token_type));
        self.repo.insert_activation_token(&record).await?;

        tracing::debug!(user_id = %user_id, token_type = %token_type, "Activation token issued");
        Ok(IssuedToken {
            token,
            expires_at: record.expires_at,
        })
    }

    /// Returns the record only when it exists, is unused and has not expired.
    pub async fn validate(
        &self,
        token: &str,
        token_type: ActivationTokenType,
    ) -> Result<Option<ActivationToken>, RepositoryError> {
        let record = self
            .repo
            .find_activation_token(&hash_token(token), token_type)
            .await?;

        Ok(record.filter(|r| !r.is_used() && !r.is_expired_at(Utc::now())))
    }

    pub async fn cleanup(&self) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - Duration::days(STALE_TOKEN_RETENTION_DAYS);
        self.repo.delete_stale_activation_tokens(cutoff).await
    }
}

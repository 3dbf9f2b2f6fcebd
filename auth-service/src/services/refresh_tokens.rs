//! Opaque refresh tokens organised in rotation families.
//!
//! Presenting a revoked token is treated as theft: the whole family is revoked so
//! the legitimate holder has to log in again as well.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::error::RepositoryError;
use super::repository::AuthRepository;
use crate::models::{ClientInfo, RefreshToken};
use crate::utils::{generate_secure_token, hash_token};

/// Result of looking up a presented refresh token.
#[derive(Debug)]
pub enum RefreshTokenStatus {
    Valid(RefreshToken),
    Unknown,
    Expired,
    /// The token was already revoked; its family has now been revoked too.
    Reused {
        user_id: Uuid,
        family_id: Uuid,
        revoked: u64,
    },
}

/// Result of a rotation attempt.
#[derive(Debug)]
pub enum Rotation {
    /// Plaintext successor, same family.
    Rotated(String),
    /// Another request rotated the token first; the family was revoked.
    Reused { revoked: u64 },
}

#[derive(Clone)]
pub struct RefreshTokenService {
    repo: Arc<dyn AuthRepository>,
    expiry_days: i64,
}

impl RefreshTokenService {
    pub fn new(repo: Arc<dyn AuthRepository>, expiry_days: i64) -> Self {
        Self { repo, expiry_days }
    }

    /// Starts a new family and returns the plaintext secret.
    pub async fn create(
        &self,
        user_id: Uuid,
        client: &ClientInfo,
    ) -> Result<String, RepositoryError> {
        let token = generate_secure_token();
        let record = RefreshToken::new(user_id, &token, self.expiry_days, client);
        self.repo.insert_refresh_token(&record).await?;

        tracing::debug!(user_id = %user_id, family_id = %record.family_id, "Refresh token family created");
        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> Result<RefreshTokenStatus, RepositoryError> {
        let Some(record) = self
            .repo
            .find_refresh_token_by_hash(&hash_token(token))
            .await?
        else {
            return Ok(RefreshTokenStatus::Unknown);
        };

        if record.is_revoked() {
            let revoked = self.revoke_token_family(record.family_id).await?;
            tracing::warn!(
                user_id = %record.user_id,
                family_id = %record.family_id,
                revoked,
                "Revoked refresh token presented, family revoked"
            );
            return Ok(RefreshTokenStatus::Reused {
                user_id: record.user_id,
                family_id: record.family_id,
                revoked,
            });
        }

        if record.is_expired_at(Utc::now()) {
            return Ok(RefreshTokenStatus::Expired);
        }

        Ok(RefreshTokenStatus::Valid(record))
    }

    /// Revokes `current` and issues its successor in the same family.
    pub async fn rotate(
        &self,
        current: &RefreshToken,
        client: &ClientInfo,
    ) -> Result<Rotation, RepositoryError> {
        let token = generate_secure_token();
        let successor = RefreshToken::in_family(
            current.user_id,
            current.family_id,
            &token,
            self.expiry_days,
            client,
        );

        if self
            .repo
            .rotate_refresh_token(current.id, &successor, Utc::now())
            .await?
        {
            return Ok(Rotation::Rotated(token));
        }

        let revoked = self.revoke_token_family(current.family_id).await?;
        tracing::warn!(
            user_id = %current.user_id,
            family_id = %current.family_id,
            revoked,
            "Concurrent rotation of the same refresh token, family revoked"
        );
        Ok(Rotation::Reused { revoked })
    }

    pub async fn revoke_token_family(&self, family_id: Uuid) -> Result<u64, RepositoryError> {
        self.repo.revoke_family(family_id, Utc::now()).await
    }

    /// Validates the token and, when valid, revokes its family.
    pub async fn logout(&self, token: &str) -> Result<RefreshTokenStatus, RepositoryError> {
        let status = self.validate(token).await?;
        if let RefreshTokenStatus::Valid(record) = &status {
            self.revoke_token_family(record.family_id).await?;
        }
        Ok(status)
    }

    /// Deletes rows past their expiry.
    pub async fn cleanup(&self) -> Result<u64, RepositoryError> {
        self.repo.delete_expired_refresh_tokens(Utc::now()).await
    }
}

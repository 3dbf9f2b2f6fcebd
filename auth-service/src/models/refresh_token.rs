use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::utils::hash_token;

/// One link in a rotation chain. Only the SHA-256 of the secret is stored.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,

    /// User this token belongs to
    pub user_id: Uuid,

    /// SHA-256 hash of the opaque token
    pub token_hash: String,

    /// Shared by every token descended from one login; never changes.
    pub family_id: Uuid,

    pub expires_at: DateTime<Utc>,

    /// Set on rotation, logout or reuse detection. Rows are revoked, not deleted.
    pub revoked_at: Option<DateTime<Utc>>,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where a token was issued from.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshToken {
    /// Start a new family (login, signup).
    pub fn new(user_id: Uuid, token: &str, expires_in_days: i64, client: &ClientInfo) -> Self {
        Self::in_family(user_id, Uuid::new_v4(), token, expires_in_days, client)
    }

    /// Successor inside an existing family (rotation).
    pub fn in_family(
        user_id: Uuid,
        family_id: Uuid,
        token: &str,
        expires_in_days: i64,
        client: &ClientInfo,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(token),
            family_id,
            expires_at: now + Duration::days(expires_in_days),
            revoked_at: None,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check if this token is valid (not expired and not revoked)
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_revoked()
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::utils::hash_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationTokenType {
    Activation,
    PasswordReset,
}

impl ActivationTokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationTokenType::Activation => "ACTIVATION",
            ActivationTokenType::PasswordReset => "PASSWORD_RESET",
        }
    }
}

impl fmt::Display for ActivationTokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationTokenType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVATION" => Ok(ActivationTokenType::Activation),
            "PASSWORD_RESET" => Ok(ActivationTokenType::PasswordReset),
            _ => Err(format!("Unknown activation token type: {}", s)),
        }
    }
}

/// Single-use token for account activation or password reset.
#[derive(Debug, Clone)]
pub struct ActivationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub token_type: ActivationTokenType,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ActivationToken {
    pub fn new(
        user_id: Uuid,
        token: &str,
        token_type: ActivationTokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(token),
            token_type,
            expires_at: now + expires_in,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_fresh() {
        let token = ActivationToken::new(
            Uuid::new_v4(),
            "secret",
            ActivationTokenType::PasswordReset,
            Duration::hours(1),
        );
        assert!(!token.is_used());
        assert!(!token.is_expired_at(Utc::now()));
        assert!(token.is_expired_at(Utc::now() + Duration::minutes(61)));
        assert_eq!(token.token_hash, hash_token("secret"));
    }

    #[test]
    fn token_types_parse() {
        assert_eq!(
            "PASSWORD_RESET".parse::<ActivationTokenType>(),
            Ok(ActivationTokenType::PasswordReset)
        );
        assert!("RESET".parse::<ActivationTokenType>().is_err());
    }
}

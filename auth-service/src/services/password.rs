//! Password hashing, policy validation and history checks.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::utils::{generate_secure_token, CredentialHasher, Password, PasswordHashString};

pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Character classes required out of {upper, lower, digit, symbol}.
pub const MIN_CHARACTER_CLASSES: usize = 3;

/// Personal-info fragments shorter than this are too common to reject on.
const MIN_PERSONAL_FRAGMENT_LEN: usize = 3;

const COMMON_PASSWORDS: [&str; 7] = [
    "Password123",
    "Orange2024",
    "Orange2026",
    "Admin123",
    "Welcome123",
    "123456789",
    "qwerty123",
];

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    TooShort { min_length: usize },
    InsufficientComplexity,
    CommonPassword,
    ContainsPersonalInfo,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::TooShort { min_length } => {
                write!(f, "Password must be at least {} characters", min_length)
            }
            PolicyViolation::InsufficientComplexity => write!(
                f,
                "Password must include at least 3 of: uppercase, lowercase, numbers, symbols"
            ),
            PolicyViolation::CommonPassword => write!(f, "This password is too common"),
            PolicyViolation::ContainsPersonalInfo => {
                write!(f, "Password cannot contain your personal information")
            }
        }
    }
}

/// Identity fragments a password must not contain.
#[derive(Debug, Clone, Copy)]
pub struct PersonalInfo<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Outcome of a policy check. Violations are reported, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct PasswordService {
    hasher: Arc<dyn CredentialHasher>,
    /// Hash of a random secret, verified against when no account matches.
    decoy_hash: Option<Arc<PasswordHashString>>,
}

impl PasswordService {
    pub fn new(hasher: impl CredentialHasher + 'static) -> Self {
        let decoy_hash = match hasher.hash(&Password::new(generate_secure_token())) {
            Ok(hash) => Some(Arc::new(hash)),
            Err(e) => {
                tracing::warn!(error = %e, "Could not derive decoy password hash");
                None
            }
        };
        Self {
            hasher: Arc::new(hasher),
            decoy_hash,
        }
    }

    pub fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        self.hasher.hash(password)
    }

    pub fn verify(&self, password_hash: &str, password: &Password) -> bool {
        self.hasher.verify(password, password_hash)
    }

    /// Spends one key derivation without any account, so a missing account costs
    /// as much as a wrong password.
    pub fn verify_decoy(&self, password: &Password) {
        match &self.decoy_hash {
            Some(hash) => {
                self.hasher.verify(password, hash.as_str());
            }
            None => {
                let _ = self.hasher.hash(password);
            }
        }
    }

    pub fn violations(
        &self,
        password: &Password,
        personal: Option<PersonalInfo<'_>>,
    ) -> Vec<PolicyViolation> {
        let password = password.as_str();
        let lowered = password.to_lowercase();
        let mut violations = Vec::new();

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            violations.push(PolicyViolation::TooShort {
                min_length: MIN_PASSWORD_LENGTH,
            });
        }

        let classes = [
            password.chars().any(|c| c.is_ascii_uppercase()),
            password.chars().any(|c| c.is_ascii_lowercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
        ];
        if classes.iter().filter(|present| **present).count() < MIN_CHARACTER_CLASSES {
            violations.push(PolicyViolation::InsufficientComplexity);
        }

        if COMMON_PASSWORDS
            .iter()
            .any(|common| lowered.contains(&common.to_lowercase()))
        {
            violations.push(PolicyViolation::CommonPassword);
        }

        if let Some(info) = personal {
            let local_part = info.email.split('@').next().unwrap_or_default();
            let leaks = [local_part, info.first_name, info.last_name]
                .iter()
                .map(|fragment| fragment.trim().to_lowercase())
                .filter(|fragment| fragment.chars().count() >= MIN_PERSONAL_FRAGMENT_LEN)
                .any(|fragment| lowered.contains(&fragment));
            if leaks {
                violations.push(PolicyViolation::ContainsPersonalInfo);
            }
        }

        violations
    }

    pub fn validate(
        &self,
        password: &Password,
        personal: Option<PersonalInfo<'_>>,
    ) -> PasswordValidation {
        let errors: Vec<String> = self
            .violations(password, personal)
            .iter()
            .map(ToString::to_string)
            .collect();
        PasswordValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// True when `password` matches any of the given hashes.
    pub fn is_in_history<'a>(
        &self,
        password: &Password,
        history: impl IntoIterator<Item = &'a String>,
    ) -> bool {
        history
            .into_iter()
            .any(|old_hash| self.hasher.verify(password, old_hash))
    }
}

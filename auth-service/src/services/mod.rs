//! Services layer: the authentication core and its storage seams.

mod activation_tokens;
mod audit;
pub mod auth;
mod authorization;
mod database;
mod email;
pub mod error;
mod jwt;
pub mod memory;
mod password;
mod refresh_tokens;
pub mod repository;

pub use activation_tokens::{ActivationTokenService, IssuedToken};
pub use audit::{AuditService, MAX_AUDIT_QUERY_LIMIT};
pub use auth::{AuthService, AuthSession, CleanupReport, RefreshedSession, RESET_REQUEST_MESSAGE};
pub use authorization::{authorize, RoleRequirement};
pub use database::Database;
pub use email::{
    token_from_link, EmailKind, EmailProvider, LogEmailProvider, MockEmailService, SentEmail,
};
pub use error::{RepositoryError, ServiceError};
pub use jwt::{AccessTokenClaims, JwtService, TokenResponse};
pub use memory::InMemoryStore;
pub use password::{PasswordService, PasswordValidation, PersonalInfo, PolicyViolation};
pub use refresh_tokens::{RefreshTokenService, RefreshTokenStatus, Rotation};
pub use repository::{
    ActivationTokenRepository, AuditLogRepository, AuthRepository, PasswordChange,
    RefreshTokenRepository, UserRepository,
};

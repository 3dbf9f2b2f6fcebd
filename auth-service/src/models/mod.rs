pub mod activation_token;
pub mod audit_log;
pub mod principal;
pub mod refresh_token;
pub mod role;
pub mod user;

pub use activation_token::{ActivationToken, ActivationTokenType};
pub use audit_log::{AuditEventType, AuditLog, Severity};
pub use principal::Principal;
pub use refresh_token::{ClientInfo, RefreshToken};
pub use role::{Department, Role, RoleName};
pub use user::{
    normalize_email, FailedLoginOutcome, NewUser, ProfileChanges, User, UserProfile, UserStatus,
    PASSWORD_HISTORY_LIMIT,
};

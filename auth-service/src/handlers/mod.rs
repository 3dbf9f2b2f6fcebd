pub mod audit;
pub mod auth;
pub mod user;

pub use audit::list_audit_logs;
pub use auth::*;
pub use user::{get_me, update_profile};

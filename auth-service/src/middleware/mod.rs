pub mod auth;
pub mod client_info;

pub use auth::{auth_middleware, require_role, AuthUser};
pub use client_info::{client_info_from_parts, RequestClient};

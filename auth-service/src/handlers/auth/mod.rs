pub mod password;
pub mod registration;
pub mod session;

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::AuthConfig;

pub use password::{confirm_password_reset, request_password_reset};
pub use registration::{activate, register, signup};
pub use session::{login, logout, refresh};

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// HttpOnly refresh cookie scoped to the auth endpoints.
pub fn refresh_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .path(config.security.refresh_cookie_path.clone())
        .http_only(true)
        .secure(!config.is_dev())
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(config.jwt.refresh_token_expiry_days))
        .build()
}

/// Expired copy of the refresh cookie. Emitted even when the request carried none.
pub fn clear_refresh_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, ""))
        .path(config.security.refresh_cookie_path.clone())
        .http_only(true)
        .secure(!config.is_dev())
        .same_site(SameSite::Strict)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn refresh_cookie_attributes() {
        let config = AuthConfig::for_tests();
        let cookie = refresh_cookie(&config, "abc".to_string());

        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/auth"));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn cookie_is_secure_outside_dev() {
        let mut config = AuthConfig::for_tests();
        config.environment = Environment::Prod;
        assert_eq!(refresh_cookie(&config, "abc".to_string()).secure(), Some(true));
        assert_eq!(clear_refresh_cookie(&config).secure(), Some(true));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie(&AuthConfig::for_tests());
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
        assert_eq!(cookie.path(), Some("/auth"));
    }
}

mod common;

use axum::http::StatusCode;
use common::{TestApp, STRONG_PASSWORD};
use internship_auth::config::{AuthConfig, Environment};

#[tokio::test]
async fn refresh_rotates_the_cookie_and_detects_reuse() {
    let app = TestApp::new().await;
    let login = app.signup("rot@x.com", STRONG_PASSWORD).await;
    let first = login.refresh_token().unwrap();

    let rotated = app.post_with_cookie("/auth/refresh", Some(&first)).await;
    assert_eq!(rotated.status, StatusCode::OK);
    assert!(rotated.body["accessToken"].as_str().is_some());
    let second = rotated.refresh_token().unwrap();
    assert_ne!(first, second);

    // Replaying the rotated-out token revokes the whole family.
    let replay = app.post_with_cookie("/auth/refresh", Some(&first)).await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.event_count("TOKEN_REUSE_DETECTED"), 1);

    let successor = app.post_with_cookie("/auth/refresh", Some(&second)).await;
    assert_eq!(successor.status, StatusCode::UNAUTHORIZED);
    assert!(app
        .store
        .refresh_tokens()
        .iter()
        .all(|t| t.revoked_at.is_some()));
}

#[tokio::test]
async fn refresh_without_or_with_unknown_cookie_is_unauthorized() {
    let app = TestApp::new().await;

    let missing = app.post_with_cookie("/auth/refresh", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let unknown = app.post_with_cookie("/auth/refresh", Some("not-a-token")).await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.event_count("TOKEN_REUSE_DETECTED"), 0);
}

#[tokio::test]
async fn refreshed_access_token_resolves_the_same_user() {
    let app = TestApp::new().await;
    let login = app.signup("same@x.com", STRONG_PASSWORD).await;

    let rotated = app
        .post_with_cookie("/auth/refresh", login.refresh_token().as_deref())
        .await;
    let access = rotated.body["accessToken"].as_str().unwrap();

    let me = app.get_as("/auth/me", Some(access)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "same@x.com");
}

#[tokio::test]
async fn refresh_cookie_attributes_in_dev() {
    let app = TestApp::new().await;
    let login = app.signup("cookie@x.com", STRONG_PASSWORD).await;

    let raw = login.refresh_cookie_header().unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Strict"));
    assert!(raw.contains("Path=/auth"));
    assert!(raw.contains("Max-Age=604800"));
    assert!(!raw.contains("Secure"));
    assert!(login.body.get("refreshToken").is_none());
}

#[tokio::test]
async fn refresh_cookie_is_secure_in_prod() {
    let mut config = AuthConfig::for_tests();
    config.environment = Environment::Prod;
    let app = TestApp::with_config(config).await;

    let login = app.signup("prod@x.com", STRONG_PASSWORD).await;
    assert!(login.refresh_cookie_header().unwrap().contains("Secure"));
}

#[tokio::test]
async fn logout_is_idempotent_and_always_clears_the_cookie() {
    let app = TestApp::new().await;

    let anonymous = app.post_with_cookie("/auth/logout", None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body["message"], "Logged out successfully");
    let cleared = anonymous.refresh_cookie_header().unwrap();
    assert!(cleared.starts_with("refreshToken=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.contains("Path=/auth"));

    let login = app.signup("bye@x.com", STRONG_PASSWORD).await;
    let token = login.refresh_token().unwrap();

    let first = app.post_with_cookie("/auth/logout", Some(&token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(app.event_count("USER_LOGOUT"), 1);

    let second = app.post_with_cookie("/auth/logout", Some(&token)).await;
    assert_eq!(second.status, StatusCode::OK);

    let refresh = app.post_with_cookie("/auth/refresh", Some(&token)).await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_fails_once_the_user_is_suspended() {
    let app = TestApp::new().await;
    let login = app.signup("later@x.com", STRONG_PASSWORD).await;
    let user_id: uuid::Uuid = login.body["user"]["id"].as_str().unwrap().parse().unwrap();

    app.store.modify_user(user_id, |u| {
        u.status = internship_auth::models::UserStatus::Suspended;
    });

    let res = app
        .post_with_cookie("/auth/refresh", login.refresh_token().as_deref())
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

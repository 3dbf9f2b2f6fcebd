mod common;

use axum::http::StatusCode;
use common::{TestApp, STRONG_PASSWORD};
use internship_auth::models::{RoleName, UserStatus};
use serde_json::json;

#[tokio::test]
async fn me_returns_the_camel_case_profile() {
    let app = TestApp::new().await;
    let signup = app.signup("me@x.com", STRONG_PASSWORD).await;

    let me = app.get_as("/auth/me", Some(&signup.access_token())).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "me@x.com");
    assert_eq!(me.body["firstName"], "Jane");
    assert_eq!(me.body["lastName"], "Doe");
    assert_eq!(me.body["role"], "CANDIDATE");
    assert_eq!(me.body["mfaEnabled"], false);
    assert!(me.body.get("passwordHash").is_none());
}

#[tokio::test]
async fn me_requires_a_valid_bearer_token() {
    let app = TestApp::new().await;

    let missing = app.get_as("/auth/me", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let garbage = app.get_as("/auth/me", Some("not.a.jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_changes_names_and_normalizes_email() {
    let app = TestApp::new().await;
    let signup = app.signup("old@x.com", STRONG_PASSWORD).await;
    let token = signup.access_token();

    let res = app
        .patch_json_as(
            "/auth/profile",
            &token,
            json!({ "firstName": "Janet", "email": "New.Address@X.com" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["firstName"], "Janet");
    assert_eq!(res.body["lastName"], "Doe");
    assert_eq!(res.body["email"], "new.address@x.com");
    assert_eq!(app.event_count("PROFILE_UPDATED"), 1);

    let login = app.login("new.address@x.com", STRONG_PASSWORD).await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn profile_email_conflict_is_409() {
    let app = TestApp::new().await;
    app.create_user("taken@x.com", RoleName::Candidate, UserStatus::Active, STRONG_PASSWORD)
        .await;
    let signup = app.signup("mine@x.com", STRONG_PASSWORD).await;

    let res = app
        .patch_json_as(
            "/auth/profile",
            &signup.access_token(),
            json!({ "email": "TAKEN@x.com" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.error(), "User with this email already exists");
}

#[tokio::test]
async fn profile_update_validates_fields() {
    let app = TestApp::new().await;
    let signup = app.signup("valid@x.com", STRONG_PASSWORD).await;

    let res = app
        .patch_json_as(
            "/auth/profile",
            &signup.access_token(),
            json!({ "firstName": "J" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

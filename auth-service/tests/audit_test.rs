mod common;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
};
use common::{TestApp, STRONG_PASSWORD};
use internship_auth::{
    config::AuthConfig,
    models::{RoleName, UserStatus},
};
use serde_json::json;
use std::net::SocketAddr;

fn signup_from(peer: &str, forwarded_for: &str) -> Request<Body> {
    let body = json!({
        "email": "origin@x.com",
        "firstName": "Ola",
        "lastName": "Berg",
        "password": STRONG_PASSWORD,
    });
    let mut req = Request::builder()
        .method("POST")
        .uri("/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(body.to_string()))
        .unwrap();
    let addr: SocketAddr = format!("{}:51000", peer).parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

#[tokio::test]
async fn forged_forwarded_header_is_not_recorded() {
    let app = TestApp::new().await;

    let res = app.send(signup_from("198.51.100.20", "203.0.113.99")).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let logs = app.store.audit_logs();
    assert!(!logs.is_empty());
    assert!(logs
        .iter()
        .all(|log| log.ip_address.as_deref() == Some("198.51.100.20")));
    assert!(app
        .store
        .refresh_tokens()
        .iter()
        .all(|t| t.ip_address.as_deref() == Some("198.51.100.20")));
}

#[tokio::test]
async fn forwarded_header_from_trusted_proxy_is_recorded() {
    let mut config = AuthConfig::for_tests();
    config.security.trusted_proxies = vec!["10.1.2.3".parse().unwrap()];
    let app = TestApp::with_config(config).await;

    let res = app.send(signup_from("10.1.2.3", "203.0.113.99")).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let logs = app.store.audit_logs();
    assert!(!logs.is_empty());
    assert!(logs
        .iter()
        .all(|log| log.ip_address.as_deref() == Some("203.0.113.99")));
}

#[tokio::test]
async fn super_admin_reads_recent_events_newest_first() {
    let app = TestApp::new().await;
    let signup = app.signup("trail@x.com", STRONG_PASSWORD).await;
    app.login("trail@x.com", "WrongPass123!@#").await;

    let root = app
        .create_user("root@x.com", RoleName::SuperAdmin, UserStatus::Active, STRONG_PASSWORD)
        .await;
    let token = app.access_token_for(&root, RoleName::SuperAdmin);

    let all = app.get_as("/auth/audit-logs", Some(&token)).await;
    assert_eq!(all.status, StatusCode::OK);
    let events = all.body.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["eventType"], "LOGIN_FAILED");
    assert_eq!(events[1]["eventType"], "USER_SIGNUP");

    let user_id = signup.body["user"]["id"].as_str().unwrap();
    let scoped = app
        .get_as(
            &format!("/auth/audit-logs?userId={}&limit=1", user_id),
            Some(&token),
        )
        .await;
    assert_eq!(scoped.status, StatusCode::OK);
    assert_eq!(scoped.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn audit_logs_are_super_admin_only() {
    let app = TestApp::new().await;
    let hr = app
        .create_user("hr@x.com", RoleName::HrAdmin, UserStatus::Active, STRONG_PASSWORD)
        .await;

    let res = app
        .get_as(
            "/auth/audit-logs",
            Some(&app.access_token_for(&hr, RoleName::HrAdmin)),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let anonymous = app.get_as("/auth/audit-logs", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn audit_write_failures_do_not_block_login() {
    let app = TestApp::new().await;
    app.signup("resilient@x.com", STRONG_PASSWORD).await;
    app.store.set_fail_audit_writes(true);

    let res = app.login("resilient@x.com", STRONG_PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
}

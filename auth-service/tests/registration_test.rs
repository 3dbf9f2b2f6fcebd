mod common;

use axum::http::StatusCode;
use common::{TestApp, STRONG_PASSWORD};
use internship_auth::models::{RoleName, UserStatus};
use internship_auth::services::{token_from_link, EmailKind};
use serde_json::json;

async fn hr_admin(app: &TestApp) -> String {
    let admin = app
        .create_user("hr@x.com", RoleName::HrAdmin, UserStatus::Active, STRONG_PASSWORD)
        .await;
    app.access_token_for(&admin, RoleName::HrAdmin)
}

fn recruiter(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "firstName": "Robin",
        "lastName": "Hart",
        "role": "RECRUITER",
    })
}

#[tokio::test]
async fn admin_registration_creates_pending_user_with_activation_link() {
    let app = TestApp::new().await;
    let token = hr_admin(&app).await;

    let res = app
        .post_json_as("/auth/register", &token, recruiter("new.hire@x.com"))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let link = res.body["activationLink"].as_str().unwrap();
    assert!(link.starts_with("http://localhost:4200/activate?token="));
    assert!(res.body["expiresAt"].is_string());

    let user_id: uuid::Uuid = res.body["userId"].as_str().unwrap().parse().unwrap();
    let user = app.store.user(user_id).unwrap();
    assert_eq!(user.status, UserStatus::Pending);
    assert!(user.created_by.is_some());
    assert_eq!(
        app.email.last_link("new.hire@x.com", EmailKind::Activation).as_deref(),
        Some(link)
    );
    assert_eq!(app.event_count("ACCOUNT_CREATED"), 1);

    let pending = app.login("new.hire@x.com", STRONG_PASSWORD).await;
    assert_eq!(pending.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn activation_sets_the_password_once() {
    let app = TestApp::new().await;
    let token = hr_admin(&app).await;
    let res = app
        .post_json_as("/auth/register", &token, recruiter("act@x.com"))
        .await;
    let link = res.body["activationLink"].as_str().unwrap().to_string();
    let activation = token_from_link(&link).unwrap();

    let weak = app
        .post_json(
            "/auth/activate",
            json!({ "token": activation, "password": "onlylowercaseletters" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let ok = app
        .post_json(
            "/auth/activate",
            json!({ "token": activation, "password": STRONG_PASSWORD }),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["message"], "Account activated successfully");
    assert_eq!(app.event_count("ACCOUNT_ACTIVATED"), 1);

    let login = app.login("act@x.com", STRONG_PASSWORD).await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["user"]["role"], "RECRUITER");

    let replay = app
        .post_json(
            "/auth/activate",
            json!({ "token": activation, "password": "Another!Secret9" }),
        )
        .await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_activation_token_is_rejected() {
    let app = TestApp::new().await;
    let token = hr_admin(&app).await;
    let res = app
        .post_json_as("/auth/register", &token, recruiter("late@x.com"))
        .await;
    let link = res.body["activationLink"].as_str().unwrap().to_string();

    let stored = app.store.activation_tokens();
    assert_eq!(stored.len(), 1);
    assert!(app.store.expire_activation_token(stored[0].id));

    let activate = app
        .post_json(
            "/auth/activate",
            json!({ "token": token_from_link(&link).unwrap(), "password": STRONG_PASSWORD }),
        )
        .await;
    assert_eq!(activate.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registration_requires_an_account_admin() {
    let app = TestApp::new().await;

    let anonymous = app.post_json("/auth/register", recruiter("x1@x.com")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let candidate = app.signup("cand@x.com", STRONG_PASSWORD).await;
    let forbidden = app
        .post_json_as(
            "/auth/register",
            &candidate.access_token(),
            recruiter("x2@x.com"),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.error(), "Insufficient permissions");
    assert_eq!(app.event_count("UNAUTHORIZED_ACCESS_ATTEMPT"), 1);

    let super_admin = app
        .create_user("root@x.com", RoleName::SuperAdmin, UserStatus::Active, STRONG_PASSWORD)
        .await;
    let allowed = app
        .post_json_as(
            "/auth/register",
            &app.access_token_for(&super_admin, RoleName::SuperAdmin),
            recruiter("x3@x.com"),
        )
        .await;
    assert_eq!(allowed.status, StatusCode::CREATED);
}

#[tokio::test]
async fn dept_chief_needs_a_known_department() {
    let app = TestApp::new().await;
    let token = hr_admin(&app).await;

    let chief = |department: Option<String>| {
        json!({
            "email": "chief@x.com",
            "firstName": "Dana",
            "lastName": "Moss",
            "role": "DEPT_CHIEF",
            "departmentId": department,
        })
    };

    let missing = app.post_json_as("/auth/register", &token, chief(None)).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.error(), "Department is required for DEPT_CHIEF role");

    let unknown = app
        .post_json_as(
            "/auth/register",
            &token,
            chief(Some(uuid::Uuid::new_v4().to_string())),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let department = app.store.add_department("Engineering").unwrap();
    let created = app
        .post_json_as(
            "/auth/register",
            &token,
            chief(Some(department.id.to_string())),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    let token = hr_admin(&app).await;

    let conflict = app
        .post_json_as("/auth/register", &token, recruiter("HR@x.com"))
        .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);
}

//! Shared setup for the router-level tests: in-memory store, captured email
//! and a fast Argon2 hasher.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use internship_auth::{
    build_router,
    config::AuthConfig,
    models::{NewUser, Principal, RoleName, User, UserStatus},
    services::{AuthService, InMemoryStore, JwtService, MockEmailService, PasswordService, UserRepository},
    utils::{Argon2Hasher, Password},
    AppState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const STRONG_PASSWORD: &str = "GoodPass123!@#";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<MockEmailService>,
    pub passwords: PasswordService,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Raw `Set-Cookie` header for the refresh cookie, if the response set one.
    pub fn refresh_cookie_header(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("refreshToken="))
            .map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_cookie_header().and_then(|raw| {
            raw.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix("refreshToken="))
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        })
    }

    pub fn access_token(&self) -> String {
        self.body["token"]["accessToken"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AuthConfig::for_tests()).await
    }

    pub async fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let passwords = PasswordService::new(Argon2Hasher::fast_insecure());
        let jwt = JwtService::new(&config.jwt);

        let auth_service = AuthService::new(
            &config,
            store.clone(),
            passwords.clone(),
            jwt.clone(),
            email.clone(),
        );

        let state = AppState {
            config,
            repo: store.clone(),
            jwt,
            auth_service,
        };
        let router = build_router(state.clone()).await.unwrap();

        Self {
            router,
            state,
            store,
            email,
            passwords,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_as(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn patch_json_as(&self, path: &str, token: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("PATCH")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_as(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// POST with an optional refresh cookie and no body.
    pub async fn post_with_cookie(&self, path: &str, refresh_token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("POST").uri(path);
        if let Some(token) = refresh_token {
            builder = builder.header(header::COOKIE, format!("refreshToken={}", token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn signup(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/signup",
            serde_json::json!({
                "email": email,
                "firstName": "Jane",
                "lastName": "Doe",
                "password": password,
            }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Inserts a user straight into the store.
    pub async fn create_user(
        &self,
        email: &str,
        role: RoleName,
        status: UserStatus,
        password: &str,
    ) -> User {
        let role = self
            .store
            .find_role_by_name(role)
            .await
            .unwrap()
            .unwrap();
        let password_hash = self
            .passwords
            .hash(&Password::new(password))
            .unwrap()
            .into_string();
        let user = User::new(NewUser {
            email: email.to_string(),
            first_name: "Sam".to_string(),
            last_name: "Lee".to_string(),
            password_hash,
            role_id: role.id,
            department_id: None,
            status,
            password_changed_at: None,
            created_by: None,
        });
        self.store.insert_user(&user).await.unwrap();
        user
    }

    pub fn access_token_for(&self, user: &User, role: RoleName) -> String {
        self.state
            .jwt
            .generate_access_token(&Principal {
                user_id: user.id,
                email: user.email.clone(),
                role,
                department_id: user.department_id,
            })
            .unwrap()
    }

    pub fn event_count(&self, event_type: &str) -> usize {
        self.store
            .audit_logs()
            .iter()
            .filter(|log| log.event_type.as_str() == event_type)
            .count()
    }
}

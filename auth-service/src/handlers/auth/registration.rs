use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{ActivateRequest, AuthResponse, RegisterRequest, RegisterResponse, SignupRequest},
        ErrorResponse, MessageResponse,
    },
    middleware::{AuthUser, RequestClient},
    utils::ValidatedJson,
    AppState,
};

use super::refresh_cookie;

/// Candidate self-registration
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Validation or password policy error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn signup(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.signup(req, &client).await?;
    let jar = jar.add(refresh_cookie(&state.config, session.refresh_token));
    Ok((StatusCode::CREATED, jar, Json(session.response)))
}

/// Create a staff or candidate account pending activation
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, activation link issued", body = RegisterResponse),
        (status = 400, description = "Validation error or invalid role/department", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AuthUser(admin): AuthUser,
    RequestClient(client): RequestClient,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth_service.register(&admin, req, &client).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

/// Set the first password of a pending account
#[utoipa::path(
    post,
    path = "/auth/activate",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or password policy error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn activate(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    ValidatedJson(req): ValidatedJson<ActivateRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.activate(req, &client).await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Account activated successfully")),
    ))
}

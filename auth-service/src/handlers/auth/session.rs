use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{AuthResponse, LoginRequest},
        ErrorResponse, MessageResponse,
    },
    middleware::RequestClient,
    services::TokenResponse,
    utils::ValidatedJson,
    AppState,
};

use super::{clear_refresh_cookie, refresh_cookie, REFRESH_COOKIE_NAME};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Invalid credentials, suspended or pending account", body = ErrorResponse),
        (status = 423, description = "Account locked", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.auth_service.login(req, &client).await?;
    let jar = jar.add(refresh_cookie(&state.config, session.refresh_token));
    Ok((StatusCode::OK, jar, Json(session.response)))
}

/// Rotate the refresh cookie and mint a new access token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Missing, invalid, expired or reused refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let presented = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    match state
        .auth_service
        .refresh(presented.as_deref(), &client)
        .await
    {
        Ok(session) => {
            let jar = jar.add(refresh_cookie(&state.config, session.refresh_token));
            Ok((StatusCode::OK, jar, Json(session.token)))
        }
        Err(e) => {
            tracing::debug!(error = %e, "Refresh rejected");
            Err(e.into())
        }
    }
}

/// Revoke the current session family and clear the refresh cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let presented = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    state
        .auth_service
        .logout(presented.as_deref(), &client)
        .await?;

    let jar = jar.add(clear_refresh_cookie(&state.config));
    Ok((
        StatusCode::OK,
        jar,
        Json(MessageResponse::new("Logged out successfully")),
    ))
}

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{PasswordResetConfirm, PasswordResetRequest},
        ErrorResponse, MessageResponse,
    },
    middleware::RequestClient,
    services::RESET_REQUEST_MESSAGE,
    utils::ValidatedJson,
    AppState,
};

/// Request a password reset link
#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Same answer whether or not the account exists", body = MessageResponse),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .request_password_reset(req, &client)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(RESET_REQUEST_MESSAGE))))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password changed, all sessions revoked", body = MessageResponse),
        (status = 400, description = "Invalid token, policy violation or reused password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth_service
        .confirm_password_reset(req, &client)
        .await?;
    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Password reset successfully")),
    ))
}

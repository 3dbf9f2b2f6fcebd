use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{auth::UpdateProfileRequest, ErrorResponse},
    middleware::{AuthUser, RequestClient},
    models::UserProfile,
    utils::ValidatedJson,
    AppState,
};

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth_service.me(&principal).await?;
    Ok((StatusCode::OK, Json(profile)))
}

/// Update name or email of the authenticated user
#[utoipa::path(
    patch,
    path = "/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 409, description = "Email already in use", body = ErrorResponse)
    ),
    tag = "User",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    RequestClient(client): RequestClient,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .auth_service
        .update_profile(&principal, req, &client)
        .await?;
    Ok((StatusCode::OK, Json(profile)))
}

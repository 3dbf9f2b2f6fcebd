use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use service_core::error::AppError;

use crate::{
    models::{AuditEventType, AuditLog, Principal},
    services::{authorize, RoleRequirement},
    AppState,
};

use super::client_info::client_info_from_parts;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token to a `Principal` and stores it in request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req).ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
    })?;

    let principal = state.jwt.resolve_principal(token).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Checks the principal set by `auth_middleware` against a `RoleRequirement`.
pub async fn require_role(
    State((state, requirement)): State<(AppState, RoleRequirement)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req.extensions().get::<Principal>().cloned().ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
    })?;

    if let Err(e) = authorize(&principal, &requirement) {
        let (parts, _) = req.into_parts();
        let client = client_info_from_parts(&parts, &state.config.security.trusted_proxies);
        state
            .auth_service
            .audit()
            .log(
                AuditLog::new(AuditEventType::UnauthorizedAccessAttempt)
                    .user(principal.user_id)
                    .client(&client)
                    .details(json!({
                        "path": parts.uri.path(),
                        "role": principal.role,
                    })),
            )
            .await;
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

/// Principal placed in extensions by `auth_middleware`.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extensions.get::<Principal>().ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
        })?;

        Ok(AuthUser(principal.clone()))
    }
}

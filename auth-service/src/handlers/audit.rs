use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{auth::AuditLogQuery, ErrorResponse},
    models::AuditLog,
    services::ServiceError,
    AppState,
};

const DEFAULT_AUDIT_LIMIT: i64 = 50;

/// Recent audit events, newest first
#[utoipa::path(
    get,
    path = "/auth/audit-logs",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit events", body = [AuditLog]),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    tag = "Audit",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    let audit = state.auth_service.audit();

    let logs = match query.user_id {
        Some(user_id) => audit.user_logs(user_id, limit).await,
        None => audit.recent_events(limit).await,
    }
    .map_err(ServiceError::from)?;

    Ok(Json(logs))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{RoleName, UserProfile};
use crate::services::TokenResponse;

/// Public candidate signup. The role is always CANDIDATE.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    #[schema(example = "john.doe@email.com")]
    pub email: String,

    #[validate(length(min = 2, max = 50, message = "First name must be 2 to 50 characters"))]
    #[schema(example = "John")]
    pub first_name: String,

    #[validate(length(min = 2, max = 50, message = "Last name must be 2 to 50 characters"))]
    #[schema(example = "Doe")]
    pub last_name: String,

    #[validate(length(min = 12, message = "Password must be at least 12 characters long"))]
    #[schema(example = "SecurePass123!@#", min_length = 12)]
    pub password: String,
}

/// Staff-created account. The user sets a password through the activation link.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    #[schema(example = "jane.smith@company.com")]
    pub email: String,

    #[validate(length(min = 2, max = 50, message = "First name must be 2 to 50 characters"))]
    #[schema(example = "Jane")]
    pub first_name: String,

    #[validate(length(min = 2, max = 50, message = "Last name must be 2 to 50 characters"))]
    #[schema(example = "Smith")]
    pub last_name: String,

    #[schema(example = "HR_ADMIN")]
    pub role: RoleName,

    /// Required for DEPT_CHIEF.
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    #[schema(example = "http://localhost:4200/activate?token=...")]
    pub activation_link: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 12, message = "Password must be at least 12 characters long"))]
    #[schema(example = "SecurePass123!@#", min_length = 12)]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "john.doe@email.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "SecurePass123!@#")]
    pub password: String,
}

/// Session returned by signup and login. The refresh token travels in a cookie.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: TokenResponse,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,

    #[validate(length(min = 2, max = 50, message = "First name must be 2 to 50 characters"))]
    pub first_name: Option<String>,

    #[validate(length(min = 2, max = 50, message = "Last name must be 2 to 50 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "john.doe@email.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetConfirm {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 12, message = "Password must be at least 12 characters long"))]
    #[schema(example = "NewSecurePass123!@#", min_length = 12)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    /// Restrict to events whose actor is this user.
    pub user_id: Option<Uuid>,
    /// Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_uses_camel_case_fields() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "email": "a@x.com",
            "firstName": "Ann",
            "lastName": "Lee",
            "password": "GoodPass123!@#"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.first_name, "Ann");
    }

    #[test]
    fn short_names_fail_validation() {
        let req = SignupRequest {
            email: "a@x.com".to_string(),
            first_name: "A".to_string(),
            last_name: "Lee".to_string(),
            password: "GoodPass123!@#".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn register_role_parses_screaming_case() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "chief@x.com",
            "firstName": "Dana",
            "lastName": "Chief",
            "role": "DEPT_CHIEF"
        }))
        .unwrap();
        assert_eq!(req.role, RoleName::DeptChief);
        assert!(req.department_id.is_none());
    }

    #[test]
    fn empty_profile_update_is_valid() {
        let req: UpdateProfileRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(req.validate().is_ok());
    }
}

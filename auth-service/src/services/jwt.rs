use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Principal, RoleName};

/// Issues and checks short-lived HS256 access tokens. Nothing is stored server-side.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_token_expiry_minutes: i64,
}

/// Claims for access tokens (short-lived)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub role: RoleName,
    /// Department ID, null for users outside any department
    pub department: Option<Uuid>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub jti: String,
    pub iss: String,
}

impl AccessTokenClaims {
    pub fn principal(&self) -> Result<Principal, anyhow::Error> {
        let user_id = Uuid::parse_str(&self.sub)
            .map_err(|e| anyhow::anyhow!("Invalid subject claim: {}", e))?;
        Ok(Principal {
            user_id,
            email: self.email.clone(),
            role: self.role,
            department_id: self.department,
        })
    }
}

/// Access token returned to clients. The refresh token travels only in a cookie.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    /// Generate an access token for a principal
    pub fn generate_access_token(&self, principal: &Principal) -> Result<String, anyhow::Error> {
        self.generate_access_token_at(principal, Utc::now())
    }

    pub fn generate_access_token_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<String, anyhow::Error> {
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: principal.user_id.to_string(),
            email: principal.email.clone(),
            role: principal.role,
            department: principal.department_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(token)
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    /// Bearer token to principal, or an error. This is the entry point for other modules.
    pub fn resolve_principal(&self, token: &str) -> Result<Principal, anyhow::Error> {
        self.validate_access_token(token)?.principal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: Secret::new("unit-test-secret-unit-test-secret-0001".to_string()),
            issuer: "internship-auth".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    fn principal() -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "chief@example.com".to_string(),
            role: RoleName::DeptChief,
            department_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config());
        let principal = principal();

        let token = service.generate_access_token(&principal)?;
        let claims = service.validate_access_token(&token)?;

        assert_eq!(claims.sub, principal.user_id.to_string());
        assert_eq!(claims.role, RoleName::DeptChief);
        assert_eq!(claims.department, principal.department_id);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
        assert_eq!(claims.iss, "internship-auth");
        Ok(())
    }

    #[test]
    fn resolves_principal_from_token() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config());
        let principal = principal();

        let token = service.generate_access_token(&principal)?;
        assert_eq!(service.resolve_principal(&token)?, principal);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<(), anyhow::Error> {
        let service = JwtService::new(&config());
        let token =
            service.generate_access_token_at(&principal(), Utc::now() - Duration::minutes(16))?;

        assert!(service.validate_access_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() -> Result<(), anyhow::Error> {
        let mut other = config();
        other.secret = Secret::new("another-secret-another-secret-00002".to_string());
        let token = JwtService::new(&other).generate_access_token(&principal())?;

        assert!(JwtService::new(&config()).validate_access_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn wrong_issuer_is_rejected() -> Result<(), anyhow::Error> {
        let mut other = config();
        other.issuer = "someone-else".to_string();
        let token = JwtService::new(&other).generate_access_token(&principal())?;

        assert!(JwtService::new(&config()).resolve_principal(&token).is_err());
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        let service = JwtService::new(&config());
        assert!(service.resolve_principal("not-a-jwt").is_err());
    }
}

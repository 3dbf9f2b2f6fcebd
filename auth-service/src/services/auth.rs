//! Signup, login, session and password-reset use cases.
//!
//! The lockout state machine is evaluated lazily on every login attempt; there is
//! no background job that unlocks accounts.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AuthConfig, LockoutConfig};
use crate::dtos::auth::{
    ActivateRequest, AuthResponse, LoginRequest, PasswordResetConfirm, PasswordResetRequest,
    RegisterRequest, RegisterResponse, SignupRequest, UpdateProfileRequest,
};
use crate::models::{
    normalize_email, ActivationTokenType, AuditEventType, AuditLog, ClientInfo, NewUser,
    Principal, ProfileChanges, RoleName, Severity, User, UserProfile, UserStatus,
};
use crate::services::{
    ActivationTokenService, AuditService, AuthRepository, EmailProvider, JwtService,
    PasswordChange, PasswordService, PersonalInfo, RefreshTokenService, RefreshTokenStatus,
    RepositoryError, Rotation, ServiceError, TokenResponse,
};
use crate::utils::{generate_secure_token, Password};

pub const RESET_REQUEST_MESSAGE: &str = "If the email exists, a reset link has been sent";

/// A new session: the response body plus the refresh secret destined for the cookie.
#[derive(Debug)]
pub struct AuthSession {
    pub response: AuthResponse,
    pub refresh_token: String,
}

#[derive(Debug)]
pub struct RefreshedSession {
    pub token: TokenResponse,
    pub refresh_token: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub refresh_tokens: u64,
    pub activation_tokens: u64,
}

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    passwords: PasswordService,
    jwt: JwtService,
    refresh_tokens: RefreshTokenService,
    activation_tokens: ActivationTokenService,
    audit: AuditService,
    email: Arc<dyn EmailProvider>,
    lockout: LockoutConfig,
    frontend_url: String,
}

fn email_conflict(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::Conflict(_) => ServiceError::EmailAlreadyRegistered,
        other => ServiceError::Repository(other),
    }
}

fn policy_check(
    passwords: &PasswordService,
    password: &Password,
    personal: PersonalInfo<'_>,
) -> Result<(), ServiceError> {
    let validation = passwords.validate(password, Some(personal));
    if validation.valid {
        Ok(())
    } else {
        Err(ServiceError::PasswordPolicy(validation.errors))
    }
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        repo: Arc<dyn AuthRepository>,
        passwords: PasswordService,
        jwt: JwtService,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            refresh_tokens: RefreshTokenService::new(
                repo.clone(),
                config.jwt.refresh_token_expiry_days,
            ),
            activation_tokens: ActivationTokenService::new(repo.clone(), &config.tokens),
            audit: AuditService::new(repo.clone()),
            repo,
            passwords,
            jwt,
            email,
            lockout: config.lockout.clone(),
            frontend_url: config.security.frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenService {
        &self.refresh_tokens
    }

    /// Candidate self-registration. The account is ACTIVE immediately.
    pub async fn signup(
        &self,
        req: SignupRequest,
        client: &ClientInfo,
    ) -> Result<AuthSession, ServiceError> {
        let email = normalize_email(&req.email);

        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let role = self
            .repo
            .find_role_by_name(RoleName::Candidate)
            .await?
            .ok_or(ServiceError::InvalidRole)?;

        let password = Password::new(req.password);
        policy_check(
            &self.passwords,
            &password,
            PersonalInfo {
                email: &email,
                first_name: &req.first_name,
                last_name: &req.last_name,
            },
        )?;
        let password_hash = self.passwords.hash(&password)?;

        let user = User::new(NewUser {
            email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash: password_hash.into_string(),
            role_id: role.id,
            department_id: None,
            status: UserStatus::Active,
            password_changed_at: Some(Utc::now()),
            created_by: None,
        });
        self.repo.insert_user(&user).await.map_err(email_conflict)?;

        tracing::info!(user_id = %user.id, "Candidate signed up");
        self.audit
            .log(
                AuditLog::new(AuditEventType::UserSignup)
                    .user(user.id)
                    .client(client)
                    .details(json!({ "email": user.email, "role": role.name })),
            )
            .await;

        self.issue_session(&user, client).await
    }

    /// Staff-created account in PENDING state with an activation link.
    pub async fn register(
        &self,
        admin: &Principal,
        req: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<RegisterResponse, ServiceError> {
        let email = normalize_email(&req.email);

        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        if req.role.requires_department() && req.department_id.is_none() {
            return Err(ServiceError::DepartmentRequired);
        }

        let role = self
            .repo
            .find_role_by_name(req.role)
            .await?
            .ok_or(ServiceError::InvalidRole)?;

        if let Some(department_id) = req.department_id {
            self.repo
                .find_department_by_id(department_id)
                .await?
                .ok_or(ServiceError::InvalidDepartment)?;
        }

        // Unusable until the activation link sets a real one.
        let placeholder = self
            .passwords
            .hash(&Password::new(generate_secure_token()))?;

        let user = User::new(NewUser {
            email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash: placeholder.into_string(),
            role_id: role.id,
            department_id: req.department_id,
            status: UserStatus::Pending,
            password_changed_at: None,
            created_by: Some(admin.user_id),
        });
        self.repo.insert_user(&user).await.map_err(email_conflict)?;

        let issued = self
            .activation_tokens
            .create(user.id, ActivationTokenType::Activation)
            .await?;
        let activation_link = format!("{}/activate?token={}", self.frontend_url, issued.token);

        tracing::info!(user_id = %user.id, created_by = %admin.user_id, role = %role.name, "Account created");
        self.audit
            .log(
                AuditLog::new(AuditEventType::AccountCreated)
                    .user(admin.user_id)
                    .target(user.id)
                    .client(client)
                    .details(json!({ "email": user.email, "role": role.name })),
            )
            .await;

        if let Err(e) = self
            .email
            .send_activation_email(&user.email, &activation_link)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Activation email not delivered");
        }

        Ok(RegisterResponse {
            user_id: user.id,
            activation_link,
            expires_at: issued.expires_at,
        })
    }

    /// Sets the first password of a PENDING account and activates it.
    pub async fn activate(
        &self,
        req: ActivateRequest,
        client: &ClientInfo,
    ) -> Result<(), ServiceError> {
        let token = self
            .activation_tokens
            .validate(&req.token, ActivationTokenType::Activation)
            .await?
            .ok_or(ServiceError::InvalidActivationToken)?;

        let user = self
            .repo
            .find_user_by_id(token.user_id)
            .await?
            .filter(|u| u.status == UserStatus::Pending)
            .ok_or(ServiceError::InvalidActivationToken)?;

        let password = Password::new(req.password);
        policy_check(
            &self.passwords,
            &password,
            PersonalInfo {
                email: &user.email,
                first_name: &user.first_name,
                last_name: &user.last_name,
            },
        )?;
        let password_hash = self.passwords.hash(&password)?;

        if !self
            .repo
            .complete_activation(token.id, user.id, password_hash.as_str(), Utc::now())
            .await?
        {
            return Err(ServiceError::InvalidActivationToken);
        }

        tracing::info!(user_id = %user.id, "Account activated");
        self.audit
            .log(
                AuditLog::new(AuditEventType::AccountActivated)
                    .user(user.id)
                    .client(client)
                    .details(json!({ "email": user.email })),
            )
            .await;

        Ok(())
    }

    pub async fn login(
        &self,
        req: LoginRequest,
        client: &ClientInfo,
    ) -> Result<AuthSession, ServiceError> {
        let now = Utc::now();
        let email = normalize_email(&req.email);
        let password = Password::new(req.password);

        let Some(mut user) = self.repo.find_user_by_email(&email).await? else {
            self.passwords.verify_decoy(&password);
            self.audit
                .log(
                    AuditLog::new(AuditEventType::LoginFailed)
                        .client(client)
                        .severity(Severity::Warning)
                        .details(json!({ "email": email, "reason": "unknown_email" })),
                )
                .await;
            return Err(ServiceError::InvalidCredentials);
        };

        if let Some(until) = user.account_locked_until.filter(|_| user.is_locked_at(now)) {
            tracing::info!(user_id = %user.id, "Login attempt on locked account");
            return Err(ServiceError::AccountLocked { until });
        }

        if user.lock_expired_at(now) {
            self.repo.unlock_expired(user.id, now).await?;
            user.status = UserStatus::Active;
            user.failed_login_attempts = 0;
            user.account_locked_until = None;
            tracing::info!(user_id = %user.id, "Lockout window elapsed, account unlocked");
        }

        match user.status {
            UserStatus::Suspended => return Err(ServiceError::AccountSuspended),
            UserStatus::Pending => return Err(ServiceError::AccountNotActivated),
            UserStatus::Active | UserStatus::Locked => {}
        }

        if !self.passwords.verify(&user.password_hash, &password) {
            return Err(self.handle_failed_password(&user, client, now).await?);
        }

        if !self.repo.record_successful_login(user.id, now).await? {
            tracing::info!(user_id = %user.id, "Account changed state during login");
            return Err(self.current_login_rejection(user.id, now).await?);
        }
        user.failed_login_attempts = 0;
        user.last_login = Some(now);

        tracing::info!(user_id = %user.id, "User logged in");
        self.audit
            .log(
                AuditLog::new(AuditEventType::UserLogin)
                    .user(user.id)
                    .client(client)
                    .details(json!({ "email": user.email })),
            )
            .await;

        self.issue_session(&user, client).await
    }

    /// Error for an account that stopped being ACTIVE after it was read.
    async fn current_login_rejection(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ServiceError, ServiceError> {
        let Some(user) = self.repo.find_user_by_id(user_id).await? else {
            return Ok(ServiceError::InvalidCredentials);
        };
        Ok(match (user.status, user.account_locked_until) {
            (UserStatus::Locked, Some(until)) if user.is_locked_at(now) => {
                ServiceError::AccountLocked { until }
            }
            (UserStatus::Suspended, _) => ServiceError::AccountSuspended,
            (UserStatus::Pending, _) => ServiceError::AccountNotActivated,
            _ => ServiceError::InvalidCredentials,
        })
    }

    /// Records the failure and picks the error to answer with.
    async fn handle_failed_password(
        &self,
        user: &User,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Result<ServiceError, ServiceError> {
        let outcome = self
            .repo
            .record_failed_login(
                user.id,
                self.lockout.max_failed_attempts,
                Duration::minutes(self.lockout.duration_minutes),
                now,
            )
            .await?;

        if outcome.newly_locked {
            tracing::warn!(
                user_id = %user.id,
                failed_attempts = outcome.failed_login_attempts,
                lockout_count_24h = outcome.lockout_count_24h,
                "Account locked after repeated failures"
            );
            self.audit
                .log(
                    AuditLog::new(AuditEventType::AccountLocked)
                        .user(user.id)
                        .client(client)
                        .severity(Severity::Warning)
                        .details(json!({
                            "reason": "Multiple failed login attempts",
                            "failedAttempts": outcome.failed_login_attempts,
                            "lockedUntil": outcome.account_locked_until,
                            "lockoutCount24h": outcome.lockout_count_24h,
                        })),
                )
                .await;
        } else {
            self.audit
                .log(
                    AuditLog::new(AuditEventType::LoginFailed)
                        .user(user.id)
                        .client(client)
                        .severity(Severity::Warning)
                        .details(json!({
                            "email": user.email,
                            "failedAttempts": outcome.failed_login_attempts,
                        })),
                )
                .await;
        }

        match (outcome.status, outcome.account_locked_until) {
            (UserStatus::Locked, Some(until)) => Ok(ServiceError::AccountLocked { until }),
            _ => Ok(ServiceError::InvalidCredentials),
        }
    }

    /// Rotates the presented refresh token and mints a new access token.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        client: &ClientInfo,
    ) -> Result<RefreshedSession, ServiceError> {
        let presented = refresh_token.ok_or(ServiceError::InvalidRefreshToken)?;

        let record = match self.refresh_tokens.validate(presented).await? {
            RefreshTokenStatus::Valid(record) => record,
            RefreshTokenStatus::Reused {
                user_id,
                family_id,
                revoked,
            } => {
                self.audit_reuse(user_id, family_id, revoked, client).await;
                return Err(ServiceError::InvalidRefreshToken);
            }
            RefreshTokenStatus::Unknown | RefreshTokenStatus::Expired => {
                return Err(ServiceError::InvalidRefreshToken)
            }
        };

        let user = self
            .repo
            .find_user_by_id(record.user_id)
            .await?
            .filter(|u| u.status == UserStatus::Active)
            .ok_or(ServiceError::InactiveUser)?;

        let principal = self.resolve_principal(&user).await?.0;
        let access_token = self.jwt.generate_access_token(&principal)?;

        match self.refresh_tokens.rotate(&record, client).await? {
            Rotation::Rotated(refresh_token) => {
                tracing::debug!(user_id = %user.id, family_id = %record.family_id, "Refresh token rotated");
                Ok(RefreshedSession {
                    token: TokenResponse { access_token },
                    refresh_token,
                })
            }
            Rotation::Reused { revoked } => {
                self.audit_reuse(user.id, record.family_id, revoked, client)
                    .await;
                Err(ServiceError::InvalidRefreshToken)
            }
        }
    }

    /// Revokes the family of the presented token. Missing or invalid tokens are not an error.
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        client: &ClientInfo,
    ) -> Result<(), ServiceError> {
        let Some(presented) = refresh_token else {
            return Ok(());
        };

        match self.refresh_tokens.logout(presented).await? {
            RefreshTokenStatus::Valid(record) => {
                tracing::info!(user_id = %record.user_id, "User logged out");
                self.audit
                    .log(
                        AuditLog::new(AuditEventType::UserLogout)
                            .user(record.user_id)
                            .client(client),
                    )
                    .await;
            }
            RefreshTokenStatus::Reused {
                user_id,
                family_id,
                revoked,
            } => self.audit_reuse(user_id, family_id, revoked, client).await,
            RefreshTokenStatus::Unknown | RefreshTokenStatus::Expired => {}
        }

        Ok(())
    }

    pub async fn me(&self, principal: &Principal) -> Result<UserProfile, ServiceError> {
        let user = self
            .repo
            .find_user_by_id(principal.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;
        Ok(self.resolve_principal(&user).await?.1)
    }

    pub async fn update_profile(
        &self,
        principal: &Principal,
        req: UpdateProfileRequest,
        client: &ClientInfo,
    ) -> Result<UserProfile, ServiceError> {
        let current = self
            .repo
            .find_user_by_id(principal.user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let changes = ProfileChanges {
            email: req
                .email
                .map(|e| normalize_email(&e))
                .filter(|e| *e != current.email),
            first_name: req.first_name,
            last_name: req.last_name,
        };

        if changes.is_empty() {
            return Ok(self.resolve_principal(&current).await?.1);
        }

        if let Some(email) = &changes.email {
            if self.repo.find_user_by_email(email).await?.is_some() {
                return Err(ServiceError::EmailAlreadyRegistered);
            }
        }

        let updated = self
            .repo
            .update_profile(current.id, &changes, Utc::now())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(_) => ServiceError::UserNotFound,
                other => email_conflict(other),
            })?;

        let fields: Vec<&str> = [
            changes.email.as_ref().map(|_| "email"),
            changes.first_name.as_ref().map(|_| "firstName"),
            changes.last_name.as_ref().map(|_| "lastName"),
        ]
        .into_iter()
        .flatten()
        .collect();

        tracing::info!(user_id = %updated.id, fields = ?fields, "Profile updated");
        self.audit
            .log(
                AuditLog::new(AuditEventType::ProfileUpdated)
                    .user(updated.id)
                    .client(client)
                    .details(json!({ "fields": fields })),
            )
            .await;

        Ok(self.resolve_principal(&updated).await?.1)
    }

    /// Answers identically whether or not the account exists.
    pub async fn request_password_reset(
        &self,
        req: PasswordResetRequest,
        client: &ClientInfo,
    ) -> Result<(), ServiceError> {
        let email = normalize_email(&req.email);
        let Some(user) = self
            .repo
            .find_user_by_email(&email)
            .await?
            .filter(|u| u.status == UserStatus::Active)
        else {
            return Ok(());
        };

        let issued = self
            .activation_tokens
            .create(user.id, ActivationTokenType::PasswordReset)
            .await?;
        let reset_link = format!("{}/reset-password?token={}", self.frontend_url, issued.token);

        if let Err(e) = self
            .email
            .send_password_reset_email(&user.email, &reset_link)
            .await
        {
            tracing::warn!(error = %e, user_id = %user.id, "Password reset email not delivered");
        }

        tracing::info!(user_id = %user.id, "Password reset requested");
        self.audit
            .log(
                AuditLog::new(AuditEventType::PasswordResetRequest)
                    .user(user.id)
                    .client(client)
                    .details(json!({ "email": user.email })),
            )
            .await;

        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        req: PasswordResetConfirm,
        client: &ClientInfo,
    ) -> Result<(), ServiceError> {
        let token = self
            .activation_tokens
            .validate(&req.token, ActivationTokenType::PasswordReset)
            .await?
            .ok_or(ServiceError::InvalidResetToken)?;

        let user = self
            .repo
            .find_user_by_id(token.user_id)
            .await?
            .filter(|u| matches!(u.status, UserStatus::Active | UserStatus::Locked))
            .ok_or(ServiceError::InvalidResetToken)?;

        let password = Password::new(req.new_password);
        policy_check(
            &self.passwords,
            &password,
            PersonalInfo {
                email: &user.email,
                first_name: &user.first_name,
                last_name: &user.last_name,
            },
        )?;

        if self.passwords.is_in_history(
            &password,
            std::iter::once(&user.password_hash).chain(&user.password_history),
        ) {
            return Err(ServiceError::PasswordReused);
        }

        let change = PasswordChange {
            password_hash: self.passwords.hash(&password)?.into_string(),
            password_history: user.history_with_current(),
        };

        if !self
            .repo
            .complete_password_reset(token.id, user.id, &change, Utc::now())
            .await?
        {
            return Err(ServiceError::InvalidResetToken);
        }

        tracing::info!(user_id = %user.id, "Password reset completed, sessions revoked");
        self.audit
            .log(
                AuditLog::new(AuditEventType::PasswordChanged)
                    .user(user.id)
                    .client(client)
                    .details(json!({ "method": "reset" })),
            )
            .await;

        Ok(())
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<CleanupReport, ServiceError> {
        let report = CleanupReport {
            refresh_tokens: self.refresh_tokens.cleanup().await?,
            activation_tokens: self.activation_tokens.cleanup().await?,
        };
        tracing::info!(
            refresh_tokens = report.refresh_tokens,
            activation_tokens = report.activation_tokens,
            "Expired tokens cleaned up"
        );
        Ok(report)
    }

    async fn issue_session(
        &self,
        user: &User,
        client: &ClientInfo,
    ) -> Result<AuthSession, ServiceError> {
        let (principal, profile) = self.resolve_principal(user).await?;
        let access_token = self.jwt.generate_access_token(&principal)?;
        let refresh_token = self.refresh_tokens.create(user.id, client).await?;

        Ok(AuthSession {
            response: AuthResponse {
                token: TokenResponse { access_token },
                user: profile,
            },
            refresh_token,
        })
    }

    /// Joins role and department by id.
    async fn resolve_principal(
        &self,
        user: &User,
    ) -> Result<(Principal, UserProfile), ServiceError> {
        let role = self
            .repo
            .find_role_by_id(user.role_id)
            .await?
            .ok_or(ServiceError::InvalidRole)?;

        let department = match user.department_id {
            Some(id) => self.repo.find_department_by_id(id).await?.map(|d| d.name),
            None => None,
        };

        let principal = Principal {
            user_id: user.id,
            email: user.email.clone(),
            role: role.name,
            department_id: user.department_id,
        };
        Ok((principal, UserProfile::from_parts(user, role.name, department)))
    }

    async fn audit_reuse(
        &self,
        user_id: Uuid,
        family_id: Uuid,
        revoked: u64,
        client: &ClientInfo,
    ) {
        self.audit
            .log(
                AuditLog::new(AuditEventType::TokenReuseDetected)
                    .user(user_id)
                    .client(client)
                    .severity(Severity::Critical)
                    .details(json!({
                        "familyId": family_id,
                        "revokedTokens": revoked,
                    })),
            )
            .await;
    }
}

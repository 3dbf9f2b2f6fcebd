//! Role checks against a resolved principal. Pure, so they compose in front of any handler.

use crate::models::{Principal, RoleName};
use super::error::ServiceError;

/// Roles allowed to reach an operation. An empty set admits any authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleRequirement {
    roles: Vec<RoleName>,
}

impl RoleRequirement {
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any_of(roles: &[RoleName]) -> Self {
        Self {
            roles: roles.to_vec(),
        }
    }

    /// Staff allowed to create accounts.
    pub fn account_admins() -> Self {
        Self::any_of(&[RoleName::HrAdmin, RoleName::SuperAdmin])
    }

    pub fn super_admin() -> Self {
        Self::any_of(&[RoleName::SuperAdmin])
    }

    pub fn allows(&self, role: RoleName) -> bool {
        self.roles.is_empty() || self.roles.contains(&role)
    }

    pub fn roles(&self) -> &[RoleName] {
        &self.roles
    }
}

pub fn authorize(principal: &Principal, requirement: &RoleRequirement) -> Result<(), ServiceError> {
    if requirement.allows(principal.role) {
        return Ok(());
    }

    tracing::warn!(
        user_id = %principal.user_id,
        role = %principal.role,
        required = ?requirement.roles(),
        "Role requirement not met"
    );
    Err(ServiceError::Forbidden("Insufficient permissions".to_string()))
}

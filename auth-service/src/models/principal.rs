use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::role::RoleName;

/// Authenticated caller resolved from a bearer token. Passed explicitly to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: RoleName,
    pub department_id: Option<Uuid>,
}

//! Role reference data. Users point at roles by id; names drive authorization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Candidate,
    HrAdmin,
    DeptChief,
    SuperAdmin,
    Recruiter,
}

impl RoleName {
    pub const ALL: [RoleName; 5] = [
        RoleName::Candidate,
        RoleName::HrAdmin,
        RoleName::DeptChief,
        RoleName::SuperAdmin,
        RoleName::Recruiter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Candidate => "CANDIDATE",
            RoleName::HrAdmin => "HR_ADMIN",
            RoleName::DeptChief => "DEPT_CHIEF",
            RoleName::SuperAdmin => "SUPER_ADMIN",
            RoleName::Recruiter => "RECRUITER",
        }
    }

    /// Roles that must be attached to a department.
    pub fn requires_department(&self) -> bool {
        matches!(self, RoleName::DeptChief)
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// Role entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: RoleName,
    pub description: Option<String>,
}

impl Role {
    pub fn new(name: RoleName, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
        }
    }
}

/// Department entity. Only the name is surfaced in profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
}

impl Department {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

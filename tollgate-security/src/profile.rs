use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tollgate_core::Identity;

/// HTTP-method category a permission or endpoint applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MethodCategory {
    Get,
    Post,
    Put,
    Delete,
    /// Every method.
    All,
}

impl MethodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodCategory::Get => "GET",
            MethodCategory::Post => "POST",
            MethodCategory::Put => "PUT",
            MethodCategory::Delete => "DELETE",
            MethodCategory::All => "ALL",
        }
    }

    /// Whether a request with HTTP `method` falls under this category.
    pub fn covers(&self, method: &str) -> bool {
        match self {
            MethodCategory::All => true,
            category => category.as_str().eq_ignore_ascii_case(method),
        }
    }

    /// Whether everything `other` applies to is also covered by `self`.
    pub fn includes(&self, other: MethodCategory) -> bool {
        *self == MethodCategory::All || *self == other
    }
}

impl std::fmt::Display for MethodCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown method category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl std::fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown method category: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

impl FromStr for MethodCategory {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(MethodCategory::Get),
            "POST" => Ok(MethodCategory::Post),
            "PUT" => Ok(MethodCategory::Put),
            "DELETE" => Ok(MethodCategory::Delete),
            "ALL" => Ok(MethodCategory::All),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// A named permission guarding the endpoint at `url` for `category`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub id: u64,
    pub name: String,
    pub url: String,
    pub category: MethodCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub id: u64,
    pub name: String,
    pub level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Normal,
    Forbidden,
}

/// A user row as the directory stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub status: UserStatus,
    pub role_id: u64,
}

impl UserRecord {
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Normal
    }
}

/// A user joined with their role and the role's permissions.
///
/// Profiles are immutable once built; caches hold them behind `Arc` and a
/// refresh replaces them wholesale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub status: UserStatus,
    pub role: RoleInfo,
    pub permissions: Vec<PermissionInfo>,
}

impl UserProfile {
    pub fn assemble(user: UserRecord, role: RoleInfo, permissions: Vec<PermissionInfo>) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
            status: user.status,
            role,
            permissions,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Normal
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.name == name)
    }
}

impl Identity for UserProfile {
    fn sub(&self) -> &str {
        &self.name
    }

    /// Permission names granted through the user's role.
    fn authorities(&self) -> BTreeSet<String> {
        self.permissions.iter().map(|p| p.name.clone()).collect()
    }
}

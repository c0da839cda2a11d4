use std::future::Future;

use serde_json::json;
use tollgate_core::TollgateConfig;
use tollgate_security::{MethodCategory, PermissionInfo, RoleInfo, UserProfile, UserStatus};

use crate::store::MemoryStore;

/// Builder for [`UserProfile`] values.
///
/// ```ignore
/// let alice = ProfileBuilder::new(1, "alice")
///     .role(10, "operator")
///     .permission("user:read", "/user/{id}", MethodCategory::Get)
///     .build();
/// ```
pub struct ProfileBuilder {
    profile: UserProfile,
}

impl ProfileBuilder {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            profile: UserProfile {
                id,
                name: name.to_string(),
                status: UserStatus::Normal,
                role: RoleInfo {
                    id: 1,
                    name: "user".into(),
                    level: 1,
                    description: None,
                },
                permissions: Vec::new(),
            },
        }
    }

    pub fn role(mut self, id: u64, name: &str) -> Self {
        self.profile.role.id = id;
        self.profile.role.name = name.to_string();
        self
    }

    pub fn level(mut self, level: u32) -> Self {
        self.profile.role.level = level;
        self
    }

    pub fn permission(mut self, name: &str, url: &str, category: MethodCategory) -> Self {
        let id = self.profile.permissions.len() as u64 + 1;
        self.profile.permissions.push(PermissionInfo {
            id,
            name: name.to_string(),
            url: url.to_string(),
            category,
            description: None,
        });
        self
    }

    /// Add permissions by name only, guarding no particular endpoint.
    pub fn authorities(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.permission(name, "/", MethodCategory::All);
        }
        self
    }

    pub fn disabled(mut self) -> Self {
        self.profile.status = UserStatus::Forbidden;
        self
    }

    pub fn build(self) -> UserProfile {
        self.profile
    }
}

/// Policy used across integration tests: base path `/api`, login and health
/// endpoints open, `ROLE_DENIED` as the denied baseline.
pub fn policy_yaml() -> &'static str {
    r#"
tollgate:
  security:
    base_path: /api
    permit_all:
      - /login/**
      - /health
    denied_permission: ROLE_DENIED
  cache:
    url_matcher:
      max_size: 1024
      expire_after_access_secs: 600
    users:
      max_size: 1024
      fan_out: 1024
  dedup:
    hard_expiry_ms: 3000
"#
}

/// [`policy_yaml`] parsed into a config.
pub fn policy_config() -> TollgateConfig {
    TollgateConfig::from_yaml_str(policy_yaml(), "test").expect("fixture policy must parse")
}

/// A small directory: an admin and an operator role, three users, four
/// permissions guarding `/user/{id}` and `/role/permission`.
///
/// | user  | id | role         | status    |
/// |-------|----|--------------|-----------|
/// | alice | 1  | admin (1)    | normal    |
/// | bob   | 2  | operator (2) | normal    |
/// | carol | 3  | operator (2) | forbidden |
pub fn sample_store() -> MemoryStore {
    MemoryStore::from_json(json!({
        "roles": [
            {"id": 1, "name": "admin", "level": 9},
            {"id": 2, "name": "operator", "level": 2}
        ],
        "users": [
            {"id": 1, "name": "alice", "status": "normal", "role_id": 1},
            {"id": 2, "name": "bob", "status": "normal", "role_id": 2},
            {"id": 3, "name": "carol", "status": "forbidden", "role_id": 2}
        ],
        "permissions": [
            {"id": 1, "name": "user:read", "url": "/user/{id}", "category": "GET"},
            {"id": 2, "name": "user:write", "url": "/user/{id}", "category": "PUT"},
            {"id": 3, "name": "role:grant", "url": "/role/permission", "category": "POST"},
            {"id": 4, "name": "user:admin", "url": "/user/{id}", "category": "ALL"}
        ],
        "grants": {
            "1": [1, 2, 3, 4],
            "2": [1]
        }
    }))
}

/// Spawn `n` copies of the task built by `make` on the current runtime and
/// collect their results in spawn order.
pub async fn run_concurrently<T, F, Fut>(n: usize, make: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let handles: Vec<_> = (0..n).map(|i| tokio::spawn(make(i))).collect();
    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.expect("concurrent task panicked"));
    }
    results
}

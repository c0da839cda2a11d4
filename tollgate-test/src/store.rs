use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;
use tollgate_security::{
    NewPermission, PermissionInfo, PermissionStore, RoleInfo, StoreError, UserDirectory,
    UserRecord, UserStatus,
};

#[derive(Default, Deserialize)]
struct Data {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    roles: Vec<RoleInfo>,
    #[serde(default)]
    permissions: Vec<PermissionInfo>,
    /// role id -> permission ids
    #[serde(default)]
    grants: BTreeMap<u64, BTreeSet<u64>>,
}

impl Data {
    fn role_permissions(&self, role_id: u64) -> Vec<PermissionInfo> {
        let Some(ids) = self.grants.get(&role_id) else {
            return Vec::new();
        };
        self.permissions
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect()
    }
}

/// In-memory user directory and permission store sharing one data set.
///
/// Clones share state, so a test can keep a handle while the services under
/// test own another. Reads are counted to assert on cache hits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Data>>,
    unavailable: Arc<AtomicBool>,
    reads: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from JSON shaped as `{"users": [...], "roles": [...], "permissions": [...], "grants": {"1": [1, 2]}}`.
    ///
    /// # Panics
    ///
    /// Panics if the JSON does not describe a valid data set.
    pub fn from_json(value: Value) -> Self {
        let data: Data = serde_json::from_value(value).expect("invalid MemoryStore fixture");
        Self {
            data: Arc::new(RwLock::new(data)),
            ..Self::default()
        }
    }

    pub fn with_role(self, id: u64, name: &str, level: u32) -> Self {
        self.write(|data| {
            data.roles.push(RoleInfo {
                id,
                name: name.to_string(),
                level,
                description: None,
            })
        });
        self
    }

    pub fn with_user(self, id: u64, name: &str, role_id: u64) -> Self {
        self.write(|data| {
            data.users.push(UserRecord {
                id,
                name: name.to_string(),
                status: UserStatus::Normal,
                role_id,
            })
        });
        self
    }

    pub fn with_permission(self, permission: PermissionInfo) -> Self {
        self.write(|data| data.permissions.push(permission));
        self
    }

    pub fn with_grant(self, role_id: u64, permission_ids: &[u64]) -> Self {
        self.write(|data| {
            data.grants
                .entry(role_id)
                .or_default()
                .extend(permission_ids.iter().copied())
        });
        self
    }

    pub fn set_status(&self, user_id: u64, status: UserStatus) {
        self.write(|data| {
            if let Some(user) = data.users.iter_mut().find(|u| u.id == user_id) {
                user.status = status;
            }
        });
    }

    pub fn rename_user(&self, user_id: u64, name: &str) {
        self.write(|data| {
            if let Some(user) = data.users.iter_mut().find(|u| u.id == user_id) {
                user.name = name.to_string();
            }
        });
    }

    pub fn remove_user(&self, user_id: u64) {
        self.write(|data| data.users.retain(|u| u.id != user_id));
    }

    pub fn grant(&self, role_id: u64, permission_ids: &[u64]) {
        self.write(|data| {
            data.grants
                .entry(role_id)
                .or_default()
                .extend(permission_ids.iter().copied())
        });
    }

    /// Make every subsequent call fail with a [`StoreError`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of read calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn permission_named(&self, name: &str) -> Option<PermissionInfo> {
        self.read(|data| data.permissions.iter().find(|p| p.name == name).cloned())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::new("store unavailable"))
        } else {
            Ok(())
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Data) -> T) -> T {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&data)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Data) -> T) -> T {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut data)
    }

    fn query<T>(&self, f: impl FnOnce(&Data) -> T) -> Result<T, StoreError> {
        self.check()?;
        Ok(self.read(f))
    }
}

impl UserDirectory for MemoryStore {
    async fn user_by_id(&self, id: u64) -> Result<Option<UserRecord>, StoreError> {
        self.query(|data| data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>, StoreError> {
        self.query(|data| data.users.iter().find(|u| u.name == name).cloned())
    }

    async fn users_by_ids(&self, ids: &[u64]) -> Result<Vec<UserRecord>, StoreError> {
        self.query(|data| {
            data.users
                .iter()
                .filter(|u| ids.contains(&u.id))
                .cloned()
                .collect()
        })
    }

    async fn users_by_names(&self, names: &[String]) -> Result<Vec<UserRecord>, StoreError> {
        self.query(|data| {
            data.users
                .iter()
                .filter(|u| names.contains(&u.name))
                .cloned()
                .collect()
        })
    }

    async fn users_by_role(&self, role_id: u64) -> Result<Vec<UserRecord>, StoreError> {
        self.query(|data| {
            data.users
                .iter()
                .filter(|u| u.role_id == role_id)
                .cloned()
                .collect()
        })
    }

    async fn role(&self, role_id: u64) -> Result<Option<RoleInfo>, StoreError> {
        self.query(|data| data.roles.iter().find(|r| r.id == role_id).cloned())
    }

    async fn roles(&self) -> Result<Vec<RoleInfo>, StoreError> {
        self.query(|data| data.roles.clone())
    }

    async fn role_permissions(&self, role_id: u64) -> Result<Vec<PermissionInfo>, StoreError> {
        self.query(|data| data.role_permissions(role_id))
    }
}

impl PermissionStore for MemoryStore {
    async fn permissions(&self) -> Result<Vec<PermissionInfo>, StoreError> {
        self.query(|data| data.permissions.clone())
    }

    async fn permission(&self, id: u64) -> Result<Option<PermissionInfo>, StoreError> {
        self.query(|data| data.permissions.iter().find(|p| p.id == id).cloned())
    }

    async fn permission_by_name(&self, name: &str) -> Result<Option<PermissionInfo>, StoreError> {
        self.query(|data| data.permissions.iter().find(|p| p.name == name).cloned())
    }

    async fn insert_permission(&self, permission: NewPermission) -> Result<PermissionInfo, StoreError> {
        self.check()?;
        Ok(self.write(|data| {
            let id = data.permissions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            let created = PermissionInfo {
                id,
                name: permission.name,
                url: permission.url,
                category: permission.category,
                description: permission.description,
            };
            data.permissions.push(created.clone());
            created
        }))
    }

    async fn update_permission(&self, permission: PermissionInfo) -> Result<(), StoreError> {
        self.check()?;
        self.write(|data| match data.permissions.iter_mut().find(|p| p.id == permission.id) {
            Some(existing) => {
                *existing = permission;
                Ok(())
            }
            None => Err(StoreError::new(format!("no permission {}", permission.id))),
        })
    }

    async fn role_exists(&self, role_id: u64) -> Result<bool, StoreError> {
        self.query(|data| data.roles.iter().any(|r| r.id == role_id))
    }

    async fn role_permission_ids(&self, role_id: u64) -> Result<BTreeSet<u64>, StoreError> {
        self.query(|data| data.grants.get(&role_id).cloned().unwrap_or_default())
    }

    async fn set_role_permission_ids(
        &self,
        role_id: u64,
        permission_ids: BTreeSet<u64>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.write(|data| {
            data.grants.insert(role_id, permission_ids);
        });
        Ok(())
    }

    async fn roles_granting(&self, permission_id: u64) -> Result<Vec<u64>, StoreError> {
        self.query(|data| {
            data.grants
                .iter()
                .filter(|(_, ids)| ids.contains(&permission_id))
                .map(|(role_id, _)| *role_id)
                .collect()
        })
    }
}

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::decision::AuthorizationEngine;
use crate::directory::UserDirectory;
use crate::error::{AdminError, StoreError};
use crate::profile::{MethodCategory, PermissionInfo};
use crate::registry::ResourceRegistry;
use crate::service::ProfileService;

/// A permission to create.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub url: String,
    pub category: MethodCategory,
    pub description: Option<String>,
}

/// A partial update of permission `id`. `url` and `category` go together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionUpdate {
    pub id: u64,
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<MethodCategory>,
    pub description: Option<String>,
}

/// How to change the permissions a role holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RolePermissionChange {
    /// Grant permissions the role does not hold yet.
    Insert(Vec<u64>),
    /// Revoke permissions the role holds.
    Delete(Vec<u64>),
    /// Replace the role's permissions entirely.
    Replace(Vec<u64>),
}

/// Persistence of permissions and role grants.
pub trait PermissionStore: Send + Sync {
    fn permissions(&self) -> impl Future<Output = Result<Vec<PermissionInfo>, StoreError>> + Send;

    fn permission(&self, id: u64) -> impl Future<Output = Result<Option<PermissionInfo>, StoreError>> + Send;

    fn permission_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<PermissionInfo>, StoreError>> + Send;

    /// Persist a new permission and return it with its assigned id.
    fn insert_permission(
        &self,
        permission: NewPermission,
    ) -> impl Future<Output = Result<PermissionInfo, StoreError>> + Send;

    fn update_permission(
        &self,
        permission: PermissionInfo,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn role_exists(&self, role_id: u64) -> impl Future<Output = Result<bool, StoreError>> + Send;

    fn role_permission_ids(
        &self,
        role_id: u64,
    ) -> impl Future<Output = Result<BTreeSet<u64>, StoreError>> + Send;

    fn set_role_permission_ids(
        &self,
        role_id: u64,
        permission_ids: BTreeSet<u64>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Roles currently granted `permission_id`.
    fn roles_granting(
        &self,
        permission_id: u64,
    ) -> impl Future<Output = Result<Vec<u64>, StoreError>> + Send;
}

/// Permission and role administration.
///
/// Every successful change is persisted first. The engine and registry are
/// then reloaded, and cached profiles of affected users are refreshed.
pub struct AuthorityAdmin<S, D> {
    store: S,
    registry: Arc<ResourceRegistry>,
    engine: Arc<AuthorizationEngine>,
    profiles: Arc<ProfileService<D>>,
}

impl<S: PermissionStore, D: UserDirectory> AuthorityAdmin<S, D> {
    pub fn new(
        store: S,
        registry: Arc<ResourceRegistry>,
        engine: Arc<AuthorizationEngine>,
        profiles: Arc<ProfileService<D>>,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            profiles,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn add_permission(&self, permission: NewPermission) -> Result<PermissionInfo, AdminError> {
        if permission.name.trim().is_empty() {
            return Err(AdminError::InvalidRequest("permission name must not be empty".into()));
        }
        if self.store.permission_by_name(&permission.name).await?.is_some() {
            return Err(AdminError::DuplicateName(permission.name));
        }
        self.check_url(permission.category, &permission.url)?;

        let created = self.store.insert_permission(permission).await?;
        tracing::info!(permission = %created.name, url = %created.url, "permission added");
        self.reload_policy().await?;
        Ok(created)
    }

    pub async fn update_permission(&self, update: PermissionUpdate) -> Result<PermissionInfo, AdminError> {
        if update.url.is_some() != update.category.is_some() {
            return Err(AdminError::InvalidRequest(
                "url and category must be updated together".into(),
            ));
        }
        let mut permission = self
            .store
            .permission(update.id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("permission {}", update.id)))?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AdminError::InvalidRequest("permission name must not be empty".into()));
            }
            if name != permission.name && self.store.permission_by_name(&name).await?.is_some() {
                return Err(AdminError::DuplicateName(name));
            }
            permission.name = name;
        }
        if let (Some(url), Some(category)) = (update.url, update.category) {
            self.check_url(category, &url)?;
            permission.url = url;
            permission.category = category;
        }
        if update.description.is_some() {
            permission.description = update.description;
        }

        self.store.update_permission(permission.clone()).await?;
        tracing::info!(permission = %permission.name, id = permission.id, "permission updated");
        self.reload_policy().await?;
        for role_id in self.store.roles_granting(permission.id).await? {
            self.profiles.refresh_role(role_id).await?;
        }
        Ok(permission)
    }

    /// Apply `change` to role `role_id` and return the permissions it now holds.
    pub async fn set_role_permissions(
        &self,
        role_id: u64,
        change: RolePermissionChange,
    ) -> Result<BTreeSet<u64>, AdminError> {
        if !self.store.role_exists(role_id).await? {
            return Err(AdminError::NotFound(format!("role {role_id}")));
        }
        let requested: BTreeSet<u64> = match &change {
            RolePermissionChange::Insert(ids) | RolePermissionChange::Delete(ids) => {
                if ids.is_empty() {
                    return Err(AdminError::InvalidRequest("no permission ids given".into()));
                }
                ids.iter().copied().collect()
            }
            RolePermissionChange::Replace(ids) => ids.iter().copied().collect(),
        };

        let known: BTreeSet<u64> = self.store.permissions().await?.iter().map(|p| p.id).collect();
        let unknown = join_ids(requested.difference(&known));
        if !unknown.is_empty() {
            return Err(AdminError::NotFound(format!("permissions {unknown}")));
        }

        let held = self.store.role_permission_ids(role_id).await?;
        let next = match change {
            RolePermissionChange::Insert(_) => {
                let already = join_ids(requested.intersection(&held));
                if !already.is_empty() {
                    return Err(AdminError::InvalidRequest(format!(
                        "role {role_id} already holds permissions {already}"
                    )));
                }
                held.union(&requested).copied().collect()
            }
            RolePermissionChange::Delete(_) => {
                let missing = join_ids(requested.difference(&held));
                if !missing.is_empty() {
                    return Err(AdminError::InvalidRequest(format!(
                        "role {role_id} does not hold permissions {missing}"
                    )));
                }
                held.difference(&requested).copied().collect()
            }
            RolePermissionChange::Replace(_) => requested,
        };

        self.store.set_role_permission_ids(role_id, next.clone()).await?;
        let refreshed = self.profiles.refresh_role(role_id).await?;
        tracing::info!(role_id, permissions = next.len(), refreshed, "role permissions changed");
        Ok(next)
    }

    fn check_url(&self, category: MethodCategory, url: &str) -> Result<(), AdminError> {
        if self.registry.is_registered(category, url) {
            Ok(())
        } else {
            Err(AdminError::UnregisteredUrl {
                category,
                url: url.to_string(),
            })
        }
    }

    async fn reload_policy(&self) -> Result<(), AdminError> {
        self.engine.refresh()?;
        let permissions = self.store.permissions().await?;
        let baseline = self.engine.baseline();
        self.registry.reload(permissions, (*baseline).clone());
        Ok(())
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a u64>) -> String {
    ids.map(u64::to_string).collect::<Vec<_>>().join(", ")
}

use std::future::Future;

use crate::error::StoreError;
use crate::profile::{PermissionInfo, RoleInfo, UserRecord};

/// Read access to the user, role and permission records profiles are built from.
///
/// Lookups of a missing record return `Ok(None)` or an empty list; `Err` is
/// reserved for store failures.
pub trait UserDirectory: Send + Sync {
    fn user_by_id(&self, id: u64) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    fn user_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    fn users_by_ids(&self, ids: &[u64]) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send;

    fn users_by_names(
        &self,
        names: &[String],
    ) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send;

    fn users_by_role(&self, role_id: u64) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send;

    fn role(&self, role_id: u64) -> impl Future<Output = Result<Option<RoleInfo>, StoreError>> + Send;

    fn roles(&self) -> impl Future<Output = Result<Vec<RoleInfo>, StoreError>> + Send;

    /// Permissions granted to `role_id`.
    fn role_permissions(
        &self,
        role_id: u64,
    ) -> impl Future<Output = Result<Vec<PermissionInfo>, StoreError>> + Send;
}

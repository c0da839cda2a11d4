use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::directory::UserDirectory;
use crate::error::ProfileError;
use crate::profile::{PermissionInfo, RoleInfo, UserProfile, UserRecord};
use crate::user_cache::MultiIndexUserCache;

/// Resolves user profiles cache-first and keeps the cache coherent with the
/// directory when users, roles or permissions change.
pub struct ProfileService<D> {
    directory: D,
    cache: Arc<MultiIndexUserCache>,
}

impl<D: UserDirectory> ProfileService<D> {
    pub fn new(directory: D, cache: Arc<MultiIndexUserCache>) -> Self {
        Self { directory, cache }
    }

    pub fn cache(&self) -> &Arc<MultiIndexUserCache> {
        &self.cache
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Profile of user `id`, loaded and cached under the id on a miss.
    pub async fn profile_by_id(&self, id: u64) -> Result<Arc<UserProfile>, ProfileError> {
        if let Some(profile) = self.cache.get_by_id(id) {
            return Ok(profile);
        }
        let user = self
            .directory
            .user_by_id(id)
            .await?
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
        let profile = Arc::new(self.assemble(user).await?);
        self.cache.cache_by_id(profile.clone());
        Ok(profile)
    }

    /// Profile of user `name`, loaded and cached under the name on a miss.
    pub async fn profile_by_name(&self, name: &str) -> Result<Arc<UserProfile>, ProfileError> {
        if let Some(profile) = self.cache.get_by_name(name) {
            return Ok(profile);
        }
        let user = self
            .directory
            .user_by_name(name)
            .await?
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;
        let profile = Arc::new(self.assemble(user).await?);
        self.cache.cache_by_name(profile.clone());
        Ok(profile)
    }

    /// Profile bound to a session token. Tokens are only known once bound by
    /// [`login`](Self::login), so this never reaches the directory.
    pub fn profile_by_token(&self, token: &str) -> Option<Arc<UserProfile>> {
        self.cache.get_by_token(token)
    }

    /// Profiles of the enabled users among `ids`.
    ///
    /// # Errors
    ///
    /// [`ProfileError::UnknownIds`] if any id does not exist.
    pub async fn profiles_by_ids(&self, ids: &[u64]) -> Result<Vec<UserProfile>, ProfileError> {
        let users = self.directory.users_by_ids(ids).await?;
        let found: BTreeSet<u64> = users.iter().map(|u| u.id).collect();
        let unknown: Vec<String> = ids
            .iter()
            .filter(|id| !found.contains(*id))
            .map(u64::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(ProfileError::UnknownIds(unknown));
        }
        self.assemble_many(users.into_iter().filter(UserRecord::is_enabled).collect())
            .await
    }

    /// Profiles of the enabled users among `names`.
    pub async fn profiles_by_names(&self, names: &[String]) -> Result<Vec<UserProfile>, ProfileError> {
        let users = self.directory.users_by_names(names).await?;
        let found: BTreeSet<&str> = users.iter().map(|u| u.name.as_str()).collect();
        let unknown: Vec<String> = names
            .iter()
            .filter(|name| !found.contains(name.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ProfileError::UnknownIds(unknown));
        }
        self.assemble_many(users.into_iter().filter(UserRecord::is_enabled).collect())
            .await
    }

    /// Reload users `ids` from the directory into every cache index.
    ///
    /// Disabled or deleted users are evicted instead. Returns how many
    /// profiles were refreshed.
    pub async fn refresh_by_ids(&self, ids: &[u64]) -> Result<usize, ProfileError> {
        let users = self.directory.users_by_ids(ids).await?;
        let found: BTreeSet<u64> = users.iter().map(|u| u.id).collect();
        for id in ids.iter().filter(|id| !found.contains(*id)) {
            self.cache.evict(*id);
        }
        self.refresh_users(users).await
    }

    pub async fn refresh_by_names(&self, names: &[String]) -> Result<usize, ProfileError> {
        let users = self.directory.users_by_names(names).await?;
        self.refresh_users(users).await
    }

    /// Reload every user holding `role_id`, after the role's permissions changed.
    pub async fn refresh_role(&self, role_id: u64) -> Result<usize, ProfileError> {
        let users = self.directory.users_by_role(role_id).await?;
        self.refresh_users(users).await
    }

    /// Bind `token` to user `name` and cache the profile under all three keys.
    pub async fn login(&self, token: &str, name: &str) -> Result<Arc<UserProfile>, ProfileError> {
        let profile = self.profile_by_name(name).await?;
        self.cache.bind_session(token, profile.clone());
        tracing::debug!(user = %profile.name, "session bound");
        Ok(profile)
    }

    /// Forget `token`. Returns whether a session was bound to it.
    pub fn logout(&self, token: &str) -> bool {
        self.cache.end_session(token).is_some()
    }

    async fn refresh_users(&self, users: Vec<UserRecord>) -> Result<usize, ProfileError> {
        let (enabled, disabled): (Vec<_>, Vec<_>) = users.into_iter().partition(UserRecord::is_enabled);
        for user in &disabled {
            self.cache.evict(user.id);
        }
        let profiles = self.assemble_many(enabled).await?;
        let count = profiles.len();
        self.cache.refresh(profiles);
        Ok(count)
    }

    async fn assemble(&self, user: UserRecord) -> Result<UserProfile, ProfileError> {
        if !user.is_enabled() {
            return Err(ProfileError::Disabled(user.name));
        }
        let role = self
            .directory
            .role(user.role_id)
            .await?
            .ok_or_else(|| ProfileError::MissingRole {
                user: user.name.clone(),
                role_id: user.role_id,
            })?;
        let permissions = self.directory.role_permissions(role.id).await?;
        Ok(UserProfile::assemble(user, role, permissions))
    }

    /// Assemble many profiles with one role listing and one permission lookup per role.
    async fn assemble_many(&self, users: Vec<UserRecord>) -> Result<Vec<UserProfile>, ProfileError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let roles: HashMap<u64, RoleInfo> = self
            .directory
            .roles()
            .await?
            .into_iter()
            .map(|role| (role.id, role))
            .collect();
        let mut grants: HashMap<u64, Vec<PermissionInfo>> = HashMap::new();
        let mut profiles = Vec::with_capacity(users.len());
        for user in users {
            let role = roles
                .get(&user.role_id)
                .cloned()
                .ok_or_else(|| ProfileError::MissingRole {
                    user: user.name.clone(),
                    role_id: user.role_id,
                })?;
            if !grants.contains_key(&role.id) {
                let permissions = self.directory.role_permissions(role.id).await?;
                grants.insert(role.id, permissions);
            }
            let permissions = grants.get(&role.id).cloned().unwrap_or_default();
            profiles.push(UserProfile::assemble(user, role, permissions));
        }
        Ok(profiles)
    }
}

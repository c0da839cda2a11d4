use std::sync::Arc;

use rayon::prelude::*;
use tollgate_cache::{BoundedCache, CacheError, CacheSettings};
use tollgate_core::{ConfigError, TollgateConfig};

use crate::profile::UserProfile;

/// Profile batches (or token indices) larger than this are refreshed in parallel.
pub const DEFAULT_FAN_OUT: usize = 1024;

/// Settings shared by the three indices of a [`MultiIndexUserCache`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserCacheSettings {
    pub cache: CacheSettings,
    pub fan_out: usize,
}

impl UserCacheSettings {
    pub fn new(cache: CacheSettings) -> Self {
        Self {
            cache,
            fan_out: DEFAULT_FAN_OUT,
        }
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    /// Read `tollgate.cache.users.*`.
    pub fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
        let cache = CacheSettings::from_config(config, "users")?;
        let fan_out: Option<usize> = config.get_opt("tollgate.cache.users.fan_out")?;
        Ok(Self {
            cache,
            fan_out: fan_out.unwrap_or(DEFAULT_FAN_OUT),
        })
    }
}

/// User profiles cached under three keys: user id, user name and session token.
///
/// [`refresh`](Self::refresh) is the only operation that updates profiles
/// already cached. Each index is updated independently, so a concurrent reader
/// may briefly see a new profile under one key and the old one under another.
pub struct MultiIndexUserCache {
    by_id: BoundedCache<u64, Arc<UserProfile>>,
    by_name: BoundedCache<String, Arc<UserProfile>>,
    by_token: BoundedCache<String, Arc<UserProfile>>,
    fan_out: usize,
}

impl MultiIndexUserCache {
    pub fn new(settings: UserCacheSettings) -> Result<Self, CacheError> {
        Ok(Self {
            by_id: BoundedCache::new(settings.cache.clone())?,
            by_name: BoundedCache::new(settings.cache.clone())?,
            by_token: BoundedCache::new(settings.cache)?,
            fan_out: settings.fan_out,
        })
    }

    pub fn get_by_id(&self, id: u64) -> Option<Arc<UserProfile>> {
        self.by_id.get(&id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<UserProfile>> {
        self.by_name.get(name)
    }

    pub fn get_by_token(&self, token: &str) -> Option<Arc<UserProfile>> {
        self.by_token.get(token)
    }

    /// Cache a freshly loaded profile under its id only.
    pub fn cache_by_id(&self, profile: Arc<UserProfile>) {
        self.by_id.save(profile.id, profile);
    }

    /// Cache a freshly loaded profile under its name only.
    pub fn cache_by_name(&self, profile: Arc<UserProfile>) {
        self.by_name.save(profile.name.clone(), profile);
    }

    /// Associate a session token with a profile (login) and cache the profile
    /// under all three keys.
    pub fn bind_session(&self, token: impl Into<String>, profile: Arc<UserProfile>) {
        self.by_id.save(profile.id, profile.clone());
        self.by_name.save(profile.name.clone(), profile.clone());
        self.by_token.save(token.into(), profile);
    }

    /// Forget a session token (logout).
    pub fn end_session(&self, token: &str) -> Option<Arc<UserProfile>> {
        self.by_token.remove(token)
    }

    /// Session tokens currently associated with `user_id`. O(n) in the token index.
    pub fn tokens_for(&self, user_id: u64) -> Vec<String> {
        self.by_token.find_keys(|profile| profile.id == user_id)
    }

    /// Drop a user from every index, sessions included.
    pub fn evict(&self, user_id: u64) {
        self.by_id.remove(&user_id);
        for name in self.by_name.find_keys(|profile| profile.id == user_id) {
            self.by_name.remove(&name);
        }
        for token in self.tokens_for(user_id) {
            self.by_token.remove(&token);
        }
    }

    /// Replace cached copies of `profiles`.
    ///
    /// Each profile is written under its id and name unconditionally. Under
    /// the token index it is written only for tokens already bound to that
    /// user id; no session is created. Large batches, or a large token index,
    /// are processed in parallel with no ordering across profiles.
    pub fn refresh(&self, profiles: Vec<UserProfile>) {
        let count = profiles.len();
        let parallel = count > self.fan_out || self.by_token.size() > self.fan_out;
        tracing::info!(count, parallel, "refreshing cached user profiles");
        if parallel {
            profiles
                .into_par_iter()
                .for_each(|profile| self.refresh_one(Arc::new(profile)));
        } else {
            for profile in profiles {
                self.refresh_one(Arc::new(profile));
            }
        }
    }

    fn refresh_one(&self, profile: Arc<UserProfile>) {
        if let Some(previous) = self.by_id.get(&profile.id) {
            if previous.name != profile.name {
                self.by_name.remove(&previous.name);
            }
        }
        self.by_id.save(profile.id, profile.clone());
        self.by_name.save(profile.name.clone(), profile.clone());
        for token in self.tokens_for(profile.id) {
            self.by_token.save(token, profile.clone());
        }
    }

    /// Entry counts of the id, name and token indices.
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.by_id.size(), self.by_name.size(), self.by_token.size())
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }
}

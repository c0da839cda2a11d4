use std::time::Duration;

use tollgate_core::{ConfigError, TollgateConfig};

/// Error raised when a cache is built with unusable settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    Misconfigured(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Misconfigured(msg) => write!(f, "Cache misconfigured: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Size and expiry bounds for a [`BoundedCache`](crate::BoundedCache).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum number of entries. Must be greater than zero.
    pub max_size: usize,

    /// Idle duration after which an entry is treated as absent. `None` disables expiry.
    pub expire_after_access: Option<Duration>,
}

impl CacheSettings {
    /// Settings with the given size bound and no expiry.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            expire_after_access: None,
        }
    }

    /// Expire entries that have not been accessed for `ttl`.
    pub fn with_expire_after_access(mut self, ttl: Duration) -> Self {
        self.expire_after_access = Some(ttl);
        self
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_size == 0 {
            return Err(CacheError::Misconfigured(
                "max_size must be greater than zero".into(),
            ));
        }
        if self.expire_after_access == Some(Duration::ZERO) {
            return Err(CacheError::Misconfigured(
                "expire_after_access must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Read the settings of the cache called `name` from
    /// `tollgate.cache.<name>.max_size` and
    /// `tollgate.cache.<name>.expire_after_access_secs`.
    ///
    /// # Errors
    ///
    /// A missing `max_size` is `ConfigError::NotFound`; a size of zero or
    /// below is `ConfigError::Invalid`.
    pub fn from_config(config: &TollgateConfig, name: &str) -> Result<Self, ConfigError> {
        let size_key = format!("tollgate.cache.{name}.max_size");
        let max_size: i64 = config.get(&size_key)?;
        if max_size <= 0 {
            return Err(ConfigError::Invalid {
                key: size_key,
                reason: format!("cache size must be positive, got {max_size}"),
            });
        }
        let ttl_key = format!("tollgate.cache.{name}.expire_after_access_secs");
        let ttl_secs: Option<u64> = config.get_opt(&ttl_key)?;
        if ttl_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: ttl_key,
                reason: "expiry must be positive".into(),
            });
        }

        let mut settings = Self::new(max_size as usize);
        if let Some(secs) = ttl_secs {
            settings = settings.with_expire_after_access(Duration::from_secs(secs));
        }
        Ok(settings)
    }
}

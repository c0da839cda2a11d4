mod loader;
pub mod section;
pub mod value;

use std::collections::HashMap;
use std::path::Path;

pub use section::ConfigSection;
pub use value::{ConfigValue, FromConfigValue};

/// Error type for configuration operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// The value parsed but violates a constraint (e.g. a zero cache size).
    Invalid { key: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Invalid { key, reason } => {
                write!(f, "Invalid config value for '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Gateway configuration loaded from YAML files, `.env` files, and environment variables.
///
/// Resolution order (lowest to highest priority):
/// 1. `tollgate.yaml` (base)
/// 2. `tollgate-{profile}.yaml` (profile override)
/// 3. `.env` file (loaded into process environment)
/// 4. `.env.{profile}` file (loaded into process environment)
/// 5. Environment variables prefixed with `TOLLGATE_`
///    (e.g. `TOLLGATE_SECURITY_BASE_PATH` overrides `tollgate.security.base_path`)
///
/// `.env` files never overwrite already-set environment variables.
///
/// Profile is determined by: `TOLLGATE_PROFILE` env var > argument > default `"dev"`.
#[derive(Debug, Clone)]
pub struct TollgateConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl TollgateConfig {
    /// Load configuration for the given profile from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile)
    }

    /// Load configuration for the given profile, looking for YAML files in `dir`.
    pub fn load_from_dir(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("TOLLGATE_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();

        loader::load_yaml_file(&dir.join("tollgate.yaml"), &mut values)?;
        loader::load_yaml_file(
            &dir.join(format!("tollgate-{active_profile}.yaml")),
            &mut values,
        )?;

        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        overlay_env(&mut values, std::env::vars());

        tracing::debug!(profile = %active_profile, keys = values.len(), "configuration loaded");

        Ok(TollgateConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(TollgateConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config (useful for testing).
    pub fn empty() -> Self {
        TollgateConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, or `None` when the key is absent.
    ///
    /// Unlike [`get_or`](Self::get_or), a present value of the wrong type is
    /// still reported as an error.
    pub fn get_opt<V: FromConfigValue>(&self, key: &str) -> Result<Option<V>, ConfigError> {
        match self.values.get(key) {
            None | Some(ConfigValue::Null) => Ok(None),
            Some(value) => V::from_config_value(value, key).map(Some),
        }
    }

    /// Get a typed value, returning a default if the key is missing or malformed.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Check whether a key exists in the config.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Build a typed section from this config.
    pub fn section<C: ConfigSection>(&self) -> Result<C, ConfigError> {
        C::from_config(self)
    }
}

/// Overlay `TOLLGATE_*` environment variables onto the flattened key space.
///
/// Convention: `tollgate.security.base_path` <-> `TOLLGATE_SECURITY_BASE_PATH`.
/// Underscores inside a segment are ambiguous with separators, so a variable
/// first tries to override an existing key whose upper-cased form matches it.
fn overlay_env(
    values: &mut HashMap<String, ConfigValue>,
    vars: impl Iterator<Item = (String, String)>,
) {
    for (env_key, env_val) in vars {
        if !env_key.starts_with("TOLLGATE_") || env_key == "TOLLGATE_PROFILE" {
            continue;
        }
        let existing = values
            .keys()
            .find(|k| env_name(k) == env_key)
            .cloned();
        let config_key = existing.unwrap_or_else(|| env_key.to_lowercase().replace('_', "."));
        values.insert(config_key, ConfigValue::String(env_val));
    }
}

fn env_name(key: &str) -> String {
    key.replace('.', "_").to_uppercase()
}

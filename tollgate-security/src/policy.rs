use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tollgate_core::{ConfigError, ConfigSection, TollgateConfig};

use crate::error::PolicyLoadError;
use crate::pattern::PathPattern;

/// Security policy read from the `tollgate.security` section.
///
/// ```yaml
/// tollgate:
///   security:
///     base_path: /api
///     permit_all: ["/login/**", "/health"]
///     denied_permission: ROLE_DENIED
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Prefix every request path carries (the web context path).
    #[serde(default)]
    pub base_path: String,

    /// Patterns, relative to `base_path`, that never require authorization.
    #[serde(default)]
    pub permit_all: Vec<String>,

    /// Sentinel permission meaning "denied regardless of authorities".
    pub denied_permission: String,
}

impl SecurityPolicy {
    /// Permit patterns with the base path prepended, in configured order.
    pub fn permit_patterns(&self) -> Vec<PathPattern> {
        self.permit_all
            .iter()
            .map(|p| PathPattern::new(join_path(&self.base_path, p)))
            .collect()
    }

    pub fn denied_baseline(&self) -> DeniedBaseline {
        DeniedBaseline::single(self.denied_permission.clone())
    }

    fn validate(&self) -> Result<(), PolicyLoadError> {
        if self.denied_permission.trim().is_empty() {
            return Err(PolicyLoadError::Malformed(
                "denied_permission must not be empty".into(),
            ));
        }
        if let Some(bad) = self.permit_all.iter().find(|p| p.trim().is_empty()) {
            return Err(PolicyLoadError::Malformed(format!(
                "permit_all contains an empty pattern: {bad:?}"
            )));
        }
        Ok(())
    }
}

impl ConfigSection for SecurityPolicy {
    fn prefix() -> &'static str {
        "tollgate.security"
    }

    fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
        let base_path: Option<String> = config.get_opt(&Self::key("base_path"))?;
        let permit_all: Option<Vec<String>> = config.get_opt(&Self::key("permit_all"))?;
        let denied_permission: String = config.get(&Self::key("denied_permission"))?;
        Ok(SecurityPolicy {
            base_path: normalize_base(base_path.unwrap_or_default()),
            permit_all: permit_all.unwrap_or_default(),
            denied_permission,
        })
    }
}

fn normalize_base(base: String) -> String {
    let trimmed = base.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub(crate) fn join_path(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Required-permission set meaning "access denied regardless of authorities".
///
/// Compared by value: a resource whose required set equals the baseline is
/// denied before any intersection check.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DeniedBaseline(BTreeSet<String>);

impl DeniedBaseline {
    pub fn new(permissions: BTreeSet<String>) -> Self {
        DeniedBaseline(permissions)
    }

    pub fn single(permission: impl Into<String>) -> Self {
        DeniedBaseline(BTreeSet::from([permission.into()]))
    }

    /// Whether `required` is exactly this baseline.
    pub fn matches(&self, required: &BTreeSet<String>) -> bool {
        !self.0.is_empty() && self.0 == *required
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where the security policy comes from. Read at startup and on every refresh.
pub trait PolicySource: Send + Sync {
    fn load(&self) -> Result<SecurityPolicy, PolicyLoadError>;
}

/// Reads the policy from the layered YAML configuration in `dir`.
pub struct ConfigPolicySource {
    dir: PathBuf,
    profile: String,
}

impl ConfigPolicySource {
    pub fn new(dir: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            profile: profile.into(),
        }
    }
}

impl PolicySource for ConfigPolicySource {
    fn load(&self) -> Result<SecurityPolicy, PolicyLoadError> {
        if !self.dir.is_dir() {
            return Err(PolicyLoadError::Unreadable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        let config = TollgateConfig::load_from_dir(&self.dir, &self.profile)?;
        let policy: SecurityPolicy = config.section()?;
        policy.validate()?;
        Ok(policy)
    }
}

/// A policy held in memory and replaced with [`set`](Self::set).
pub struct StaticPolicySource {
    policy: ArcSwap<SecurityPolicy>,
}

impl StaticPolicySource {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
        }
    }

    /// Build from an already loaded configuration.
    pub fn from_config(config: &TollgateConfig) -> Result<Self, PolicyLoadError> {
        let policy: SecurityPolicy = config.section()?;
        policy.validate()?;
        Ok(Self::new(policy))
    }

    /// Replace the policy returned by subsequent loads.
    pub fn set(&self, policy: SecurityPolicy) {
        self.policy.store(Arc::new(policy));
    }
}

impl PolicySource for StaticPolicySource {
    fn load(&self) -> Result<SecurityPolicy, PolicyLoadError> {
        let policy = self.policy.load_full();
        policy.validate()?;
        Ok(SecurityPolicy::clone(&policy))
    }
}

impl<P: PolicySource + ?Sized> PolicySource for Arc<P> {
    fn load(&self) -> Result<SecurityPolicy, PolicyLoadError> {
        (**self).load()
    }
}

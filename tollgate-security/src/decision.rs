use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tollgate_cache::CacheSettings;

use crate::error::PolicyLoadError;
use crate::matcher::UrlAccessMatcher;
use crate::policy::{DeniedBaseline, PolicySource};

/// Why a request was allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grant {
    /// The path matches a permit pattern; authorities were not consulted.
    Exempt,
    /// The caller holds at least one required permission.
    Authorized,
}

/// Why a request was denied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DenyReason {
    NoGrantedAuthorities,
    /// The resource requires exactly the denied baseline.
    DeniedByPolicy,
    MissingPermission,
}

impl DenyReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::NoGrantedAuthorities => "no_granted_authorities",
            DenyReason::DeniedByPolicy => "denied_by_policy",
            DenyReason::MissingPermission => "missing_permission",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::NoGrantedAuthorities => write!(f, "no granted authorities"),
            DenyReason::DeniedByPolicy => write!(f, "resource is access-denied by policy"),
            DenyReason::MissingPermission => write!(f, "caller lacks required permission"),
        }
    }
}

impl std::error::Error for DenyReason {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Deny(reason) => Some(*reason),
            Decision::Allow(_) => None,
        }
    }
}

/// Evaluates caller authorities against the permissions a resource requires.
///
/// The denied baseline is held behind an [`ArcSwap`]: [`refresh`](Self::refresh)
/// replaces it wholesale and a concurrent [`decide`](Self::decide) sees
/// either the old or the new set. Refreshes are serialized so the permit
/// list and the baseline always come from the same policy load.
pub struct AuthorizationEngine {
    matcher: Arc<UrlAccessMatcher>,
    source: Arc<dyn PolicySource>,
    baseline: ArcSwap<DeniedBaseline>,
    /// Held by `refresh` only; `decide` never takes it.
    refreshing: Mutex<()>,
}

impl AuthorizationEngine {
    /// Build an engine around an existing matcher, loading the baseline once.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyLoadError`] of the source; initialization must stop.
    pub fn new(
        matcher: Arc<UrlAccessMatcher>,
        source: Arc<dyn PolicySource>,
    ) -> Result<Self, PolicyLoadError> {
        let policy = source.load().inspect_err(|err| {
            tracing::error!(error = %err, "failed to load security policy");
        })?;
        Ok(Self {
            matcher,
            source,
            baseline: ArcSwap::from_pointee(policy.denied_baseline()),
            refreshing: Mutex::new(()),
        })
    }

    /// Build the matcher and the engine from one policy load.
    pub fn from_source(
        source: Arc<dyn PolicySource>,
        settings: CacheSettings,
    ) -> Result<Self, PolicyLoadError> {
        let policy = source.load().inspect_err(|err| {
            tracing::error!(error = %err, "failed to load security policy");
        })?;
        let matcher = UrlAccessMatcher::from_policy(&policy, settings)
            .map_err(|err| PolicyLoadError::Malformed(err.to_string()))?;
        tracing::info!(
            permit_patterns = policy.permit_all.len(),
            base_path = %policy.base_path,
            "authorization engine initialized"
        );
        Ok(Self {
            matcher: Arc::new(matcher),
            source,
            baseline: ArcSwap::from_pointee(policy.denied_baseline()),
            refreshing: Mutex::new(()),
        })
    }

    /// Decide whether a caller holding `authorities` may access `path`, which
    /// requires any one of `required`.
    ///
    /// Checks run in a fixed order: exempt path, empty authorities, denied
    /// baseline, intersection.
    pub fn decide(
        &self,
        authorities: &BTreeSet<String>,
        path: &str,
        required: &BTreeSet<String>,
    ) -> Decision {
        if !self.matcher.requires_verification(path) {
            return Decision::Allow(Grant::Exempt);
        }
        if authorities.is_empty() {
            tracing::debug!(path = %path, "denied: no granted authorities");
            return Decision::Deny(DenyReason::NoGrantedAuthorities);
        }
        let baseline = self.baseline.load();
        if baseline.matches(required) {
            tracing::warn!(path = %path, "denied by policy baseline");
            return Decision::Deny(DenyReason::DeniedByPolicy);
        }
        if authorities.intersection(required).next().is_some() {
            tracing::debug!(path = %path, "authorized");
            return Decision::Allow(Grant::Authorized);
        }
        tracing::debug!(path = %path, required = ?required, "denied: missing permission");
        Decision::Deny(DenyReason::MissingPermission)
    }

    /// Reload the policy, replacing the permit list and the denied baseline.
    ///
    /// # Errors
    ///
    /// Returns the source's error without touching the current state.
    pub fn refresh(&self) -> Result<(), PolicyLoadError> {
        let _serial = self
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let policy = self.source.load().inspect_err(|err| {
            tracing::error!(error = %err, "policy refresh failed");
        })?;
        let baseline = policy.denied_baseline();
        let baseline_size = baseline.len();
        self.matcher.reload(policy.permit_patterns());
        self.baseline.store(Arc::new(baseline));
        tracing::info!(
            permit_patterns = policy.permit_all.len(),
            baseline_size,
            "security policy refreshed"
        );
        Ok(())
    }

    /// Snapshot of the current denied baseline.
    pub fn baseline(&self) -> Arc<DeniedBaseline> {
        self.baseline.load_full()
    }

    pub fn matcher(&self) -> &Arc<UrlAccessMatcher> {
        &self.matcher
    }

    pub fn requires_verification(&self, path: &str) -> bool {
        self.matcher.requires_verification(path)
    }
}

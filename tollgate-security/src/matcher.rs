use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tollgate_cache::{BoundedCache, CacheError, CacheSettings};

use crate::pattern::PathPattern;
use crate::policy::SecurityPolicy;

/// Decides whether a request path needs authorization.
///
/// Paths matching one of the permit patterns are exempt. Decisions are
/// memoized per exact path string, both outcomes included, so the pattern
/// list is evaluated once per distinct path. Every distinct path occupies
/// its own cache slot: paths carrying highly variable parameters crowd out
/// more useful entries.
pub struct UrlAccessMatcher {
    permit: ArcSwap<Vec<PathPattern>>,
    /// `path -> (generation, requires verification)`.
    decisions: BoundedCache<String, (u64, bool)>,
    /// Bumped on reload; memoized decisions from older generations are ignored.
    generation: AtomicU64,
    evaluations: AtomicU64,
}

impl UrlAccessMatcher {
    /// # Errors
    ///
    /// Returns [`CacheError::Misconfigured`] for unusable cache settings.
    pub fn new(permit: Vec<PathPattern>, settings: CacheSettings) -> Result<Self, CacheError> {
        Ok(Self {
            permit: ArcSwap::from_pointee(permit),
            decisions: BoundedCache::new(settings)?,
            generation: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
        })
    }

    pub fn from_policy(policy: &SecurityPolicy, settings: CacheSettings) -> Result<Self, CacheError> {
        Self::new(policy.permit_patterns(), settings)
    }

    /// `false` when `path` matches a permit pattern, `true` otherwise.
    pub fn requires_verification(&self, path: &str) -> bool {
        let generation = self.generation.load(Ordering::Acquire);
        if let Some((cached_generation, requires)) = self.decisions.get(path) {
            if cached_generation == generation {
                return requires;
            }
        }

        let permit = self.permit.load();
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let requires = match permit.iter().find(|pattern| pattern.matches(path)) {
            Some(pattern) => {
                tracing::debug!(path = %path, pattern = %pattern, "path exempt from verification");
                false
            }
            None => {
                tracing::debug!(path = %path, "path requires verification");
                true
            }
        };
        self.decisions.save(path.to_string(), (generation, requires));
        requires
    }

    /// Replace the permit list and forget every memoized decision.
    pub fn reload(&self, permit: Vec<PathPattern>) {
        let count = permit.len();
        self.permit.store(Arc::new(permit));
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.decisions.clear();
        tracing::debug!(patterns = count, "permit patterns reloaded");
    }

    /// Snapshot of the current permit list.
    pub fn permit_paths(&self) -> Arc<Vec<PathPattern>> {
        self.permit.load_full()
    }

    /// How many times the permit list has been evaluated (memo misses).
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cached_decisions(&self) -> usize {
        self.decisions.size()
    }
}

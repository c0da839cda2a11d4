pub mod backend;
pub mod fingerprint;
pub mod interceptor;

pub use backend::{InMemoryLockBackend, LockBackend};
pub use fingerprint::{Fingerprint, FingerprintError, KeyStrategy};
pub use interceptor::{FromRejection, RepeatLock};

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tollgate_core::{ConfigError, ConfigSection, TollgateConfig};

/// Settings read from the `tollgate.dedup` section.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DedupSettings {
    /// Held tickets older than this stop blocking their key. `None` keeps
    /// tickets until released.
    pub hard_expiry: Option<Duration>,
}

impl ConfigSection for DedupSettings {
    fn prefix() -> &'static str {
        "tollgate.dedup"
    }

    fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
        let key = Self::key("hard_expiry_ms");
        let hard_expiry_ms: Option<u64> = config.get_opt(&key)?;
        if hard_expiry_ms == Some(0) {
            return Err(ConfigError::Invalid {
                key,
                reason: "hard expiry must be positive".into(),
            });
        }
        Ok(DedupSettings {
            hard_expiry: hard_expiry_ms.map(Duration::from_millis),
        })
    }
}

/// Result of running an operation under the lock.
#[derive(Debug, PartialEq, Eq)]
pub enum LockOutcome<T> {
    /// The operation ran and produced `T`, whether success or failure.
    Completed(T),
    /// Another call with the same fingerprint is in flight; the operation did not run.
    Duplicate(Fingerprint),
    /// No fingerprint could be derived; the operation did not run.
    Unkeyed(FingerprintError),
}

impl<T> LockOutcome<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LockOutcome::Duplicate(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            LockOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Fold the two rejections into a [`DedupRejection`].
    pub fn into_result(self) -> Result<T, DedupRejection> {
        match self {
            LockOutcome::Completed(value) => Ok(value),
            LockOutcome::Duplicate(fingerprint) => Err(DedupRejection::Duplicate(fingerprint)),
            LockOutcome::Unkeyed(err) => Err(DedupRejection::Unkeyed(err)),
        }
    }
}

/// Why the lock refused to run an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DedupRejection {
    Duplicate(Fingerprint),
    Unkeyed(FingerprintError),
}

impl std::fmt::Display for DedupRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DedupRejection::Duplicate(fingerprint) => {
                write!(f, "Duplicate in-flight request: {fingerprint}")
            }
            DedupRejection::Unkeyed(err) => write!(f, "Request key unavailable: {err}"),
        }
    }
}

impl std::error::Error for DedupRejection {}

/// Frees a held key when dropped: on return, on error, on panic and on
/// cancellation of the enclosing future.
struct ReleaseOnDrop<'a> {
    backend: &'a dyn LockBackend,
    key: &'a Fingerprint,
    ticket: u64,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        if !self.backend.release(self.key, self.ticket) {
            tracing::debug!(fingerprint = %self.key, "lock ticket was already taken over");
        }
    }
}

/// Reject-on-contention lock keyed by request fingerprint.
///
/// At most one operation per fingerprint runs at a time. A second caller
/// arriving while the first is in flight gets [`LockOutcome::Duplicate`]
/// immediately; it never waits. Cloning yields a handle to the same lock.
#[derive(Clone)]
pub struct DedupLock {
    backend: Arc<dyn LockBackend>,
}

impl DedupLock {
    pub fn new(backend: impl LockBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory(settings: &DedupSettings) -> Self {
        let backend = match settings.hard_expiry {
            Some(expiry) => InMemoryLockBackend::new().with_hard_expiry(expiry),
            None => InMemoryLockBackend::new(),
        };
        Self::new(backend)
    }

    /// In-memory lock configured from `tollgate.dedup`.
    pub fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
        let settings: DedupSettings = config.section()?;
        Ok(Self::in_memory(&settings))
    }

    /// Run `op` while holding `key`.
    ///
    /// A failed key derivation is reported as [`LockOutcome::Unkeyed`]
    /// without running `op`. The key is released however the future ends,
    /// including when it is dropped before completion.
    pub async fn wrap<T, F, Fut>(&self, key: Result<Fingerprint, FingerprintError>, op: F) -> LockOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let key = match key {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(error = %err, "request key unavailable");
                return LockOutcome::Unkeyed(err);
            }
        };
        let Some(ticket) = self.backend.try_acquire(&key) else {
            tracing::info!(fingerprint = %key, "duplicate in-flight request rejected");
            return LockOutcome::Duplicate(key);
        };
        let _release = ReleaseOnDrop {
            backend: self.backend.as_ref(),
            key: &key,
            ticket,
        };
        LockOutcome::Completed(op().await)
    }

    /// Synchronous form of [`wrap`](Self::wrap). The key is released even if `op` panics.
    pub fn run<T>(&self, key: Result<Fingerprint, FingerprintError>, op: impl FnOnce() -> T) -> LockOutcome<T> {
        let key = match key {
            Ok(key) => key,
            Err(err) => {
                tracing::debug!(error = %err, "request key unavailable");
                return LockOutcome::Unkeyed(err);
            }
        };
        let Some(ticket) = self.backend.try_acquire(&key) else {
            tracing::info!(fingerprint = %key, "duplicate in-flight request rejected");
            return LockOutcome::Duplicate(key);
        };
        let _release = ReleaseOnDrop {
            backend: self.backend.as_ref(),
            key: &key,
            ticket,
        };
        LockOutcome::Completed(op())
    }

    /// Whether `key` is currently held.
    pub fn is_held(&self, key: &Fingerprint) -> bool {
        self.backend.is_held(key)
    }

    pub fn held(&self) -> usize {
        self.backend.held()
    }

    /// Drop tickets older than the hard expiry.
    pub fn purge_expired(&self) -> usize {
        self.backend.purge_expired()
    }

    /// Spawn a task on the current tokio runtime that purges stale tickets
    /// every `period`. It ends once every handle to the lock is dropped.
    pub fn spawn_purger(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<dyn LockBackend> = Arc::downgrade(&self.backend);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(backend) = weak.upgrade() else {
                    break;
                };
                let purged = backend.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "purged stale lock tickets");
                }
            }
        })
    }
}

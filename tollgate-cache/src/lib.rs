pub mod settings;

pub use settings::{CacheError, CacheSettings};

use dashmap::DashMap;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

/// Recency stamp of a slot that has not been indexed yet.
const UNSTAMPED: u64 = u64::MAX;

/// A cached value plus its access bookkeeping.
struct Slot<V> {
    value: V,
    /// Nanoseconds since the cache epoch at the last read or write.
    last_access: AtomicU64,
    /// Key of this slot in the recency index.
    recency: AtomicU64,
}

/// Access order of the live entries, oldest first.
struct RecencyIndex<K> {
    clock: u64,
    order: BTreeMap<u64, K>,
}

struct Inner<K, V> {
    map: DashMap<K, Slot<V>>,
    /// Serializes admission of new keys so the size bound holds under
    /// concurrent inserts. Reads, overwrites and single removals never
    /// take it.
    admission: Mutex<()>,
    /// Taken after a map shard lock, never before one.
    recency: Mutex<RecencyIndex<K>>,
    epoch: Instant,
    settings: CacheSettings,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn index(&self) -> MutexGuard<'_, RecencyIndex<K>> {
        self.recency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `slot` as the most recently used entry.
    fn touch(&self, key: &K, slot: &Slot<V>) {
        slot.last_access.store(self.now_nanos(), Ordering::Relaxed);
        let mut index = self.index();
        let stamp = index.clock;
        index.clock += 1;
        let old = slot.recency.swap(stamp, Ordering::Relaxed);
        let key = index.order.remove(&old).unwrap_or_else(|| key.clone());
        index.order.insert(stamp, key);
    }

    /// Drop the index entry of a slot that left the map.
    fn forget(&self, slot: &Slot<V>) {
        let stamp = slot.recency.load(Ordering::Relaxed);
        if stamp != UNSTAMPED {
            self.index().order.remove(&stamp);
        }
    }

    fn is_idle(&self, slot: &Slot<V>) -> bool {
        match self.settings.expire_after_access {
            Some(ttl) => {
                let idle = self.now_nanos().saturating_sub(slot.last_access.load(Ordering::Relaxed));
                Duration::from_nanos(idle) >= ttl
            }
            None => false,
        }
    }

    /// Remove the least recently used entry. Returns `false` once the index
    /// is empty.
    ///
    /// The oldest stamp is popped with the index lock released before the map
    /// is locked. A stamp whose slot was touched or removed in between is
    /// stale and simply dropped; the caller rechecks the size.
    fn evict_lru(&self) -> bool {
        let Some((stamp, key)) = self.index().order.pop_first() else {
            return false;
        };
        self.map
            .remove_if(&key, |_, slot| slot.recency.load(Ordering::Relaxed) == stamp);
        true
    }

    fn evict_expired(&self) -> usize {
        if self.settings.expire_after_access.is_none() {
            return 0;
        }
        let before = self.map.len();
        self.map.retain(|_, slot| {
            let idle = self.is_idle(slot);
            if idle {
                self.forget(slot);
            }
            !idle
        });
        before.saturating_sub(self.map.len())
    }

    fn clear(&self) {
        let _admission = self.admission.lock().unwrap_or_else(PoisonError::into_inner);
        self.map.clear();
        self.index().order.clear();
    }
}

/// A thread-safe cache bounded by size and, optionally, by idle time.
///
/// - At most [`CacheSettings::max_size`] entries are held. Admitting a new key
///   into a full cache first evicts the least recently accessed entry.
/// - With [`CacheSettings::expire_after_access`] set, an entry not read or
///   written for that long is treated as absent and removed lazily on access,
///   or eagerly by [`evict_expired`](Self::evict_expired) /
///   [`spawn_sweeper`](Self::spawn_sweeper).
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct BoundedCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BoundedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    /// Create a cache with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Misconfigured`] if `max_size` is zero or the
    /// expiry duration is zero.
    pub fn new(settings: CacheSettings) -> Result<Self, CacheError> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                map: DashMap::new(),
                admission: Mutex::new(()),
                recency: Mutex::new(RecencyIndex {
                    clock: 0,
                    order: BTreeMap::new(),
                }),
                epoch: Instant::now(),
                settings,
            }),
        })
    }

    /// Create a cache holding at most `max_size` entries, without expiry.
    pub fn with_capacity(max_size: usize) -> Result<Self, CacheError> {
        Self::new(CacheSettings::new(max_size))
    }

    /// Get a cached value if it exists and hasn't gone idle.
    ///
    /// A hit refreshes the entry's recency and idle timer.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.inner.map.get(key)?;
        if self.inner.is_idle(&slot) {
            drop(slot);
            let expired = self.inner.map.remove_if(key, |_, slot| self.inner.is_idle(slot));
            if let Some((_, slot)) = expired {
                self.inner.forget(&slot);
            }
            return None;
        }
        self.inner.touch(slot.key(), &slot);
        Some(slot.value.clone())
    }

    /// Whether a live entry exists for `key`. Does not refresh recency.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .map
            .get(key)
            .is_some_and(|slot| !self.inner.is_idle(&slot))
    }

    /// Insert or overwrite a value, marking it most recently used.
    pub fn save(&self, key: K, value: V) {
        if let Some(mut slot) = self.inner.map.get_mut(&key) {
            slot.value = value;
            self.inner.touch(&key, &slot);
            return;
        }

        let _admission = self
            .inner
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mut slot) = self.inner.map.get_mut(&key) {
            slot.value = value;
            self.inner.touch(&key, &slot);
            return;
        }
        while self.inner.map.len() >= self.inner.settings.max_size {
            if !self.inner.evict_lru() {
                break;
            }
        }
        let slot = self.inner.map.entry(key).insert(Slot {
            value,
            last_access: AtomicU64::new(self.inner.now_nanos()),
            recency: AtomicU64::new(UNSTAMPED),
        });
        self.inner.touch(slot.key(), &slot);
    }

    /// Remove a specific entry from the cache.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let (_, slot) = self.inner.map.remove(key)?;
        self.inner.forget(&slot);
        Some(slot.value)
    }

    /// Number of stored entries, including idle ones not yet swept.
    pub fn size(&self) -> usize {
        self.inner.map.len()
    }

    /// Find the key of the first live entry whose value satisfies `predicate`.
    ///
    /// This is a linear scan: O(n) in the number of entries, bounded by
    /// `max_size`. Keep it to small caches.
    pub fn find_key(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<K> {
        self.inner
            .map
            .iter()
            .find(|e| !self.inner.is_idle(e.value()) && predicate(&e.value().value))
            .map(|e| e.key().clone())
    }

    /// Keys of every live entry whose value satisfies `predicate`. O(n).
    pub fn find_keys(&self, mut predicate: impl FnMut(&V) -> bool) -> Vec<K> {
        self.inner
            .map
            .iter()
            .filter(|e| !self.inner.is_idle(e.value()) && predicate(&e.value().value))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Remove all entries from the cache.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Remove all idle-expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.inner.evict_expired()
    }

    /// The settings this cache was built with.
    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }
}

impl<K: Eq + Hash + Clone, V: Clone + PartialEq> BoundedCache<K, V> {
    /// Whether any live entry holds `value`.
    ///
    /// Linear scan, O(n) in the number of entries. Keep it to small caches.
    pub fn exists_value(&self, value: &V) -> bool {
        self.find_key(|v| v == value).is_some()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Spawn a background task on the current tokio runtime that sweeps
    /// idle entries every `period`.
    ///
    /// The task holds only a weak reference and ends once every handle to
    /// the cache has been dropped.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Inner<K, V>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.evict_expired();
                if removed > 0 {
                    tracing::debug!(removed, "swept idle cache entries");
                }
            }
        })
    }
}

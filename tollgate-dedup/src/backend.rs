use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::fingerprint::Fingerprint;

/// Storage for held lock tickets.
///
/// `try_acquire` must be a single atomic check-and-set: two concurrent
/// callers with the same key can never both succeed.
pub trait LockBackend: Send + Sync + 'static {
    /// Take `key` if it is free. Returns the ticket id identifying this holder.
    fn try_acquire(&self, key: &Fingerprint) -> Option<u64>;

    /// Free `key` if `ticket` still holds it. Releasing a key that is free,
    /// or held under another ticket, does nothing and returns `false`.
    fn release(&self, key: &Fingerprint, ticket: u64) -> bool;

    /// Drop tickets held longer than the hard expiry. Returns how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Whether `key` is held by a ticket that has not expired.
    fn is_held(&self, key: &Fingerprint) -> bool;

    /// Number of currently held keys.
    fn held(&self) -> usize;
}

struct Ticket {
    id: u64,
    acquired_at: Instant,
}

/// In-process ticket table.
///
/// With a hard expiry, a ticket older than the expiry no longer blocks its
/// key: the next acquisition takes it over, and the stale holder's release
/// becomes a no-op because its ticket id no longer matches.
#[derive(Clone)]
pub struct InMemoryLockBackend {
    tickets: Arc<DashMap<Fingerprint, Ticket>>,
    next_id: Arc<AtomicU64>,
    hard_expiry: Option<Duration>,
}

impl InMemoryLockBackend {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            hard_expiry: None,
        }
    }

    pub fn with_hard_expiry(mut self, expiry: Duration) -> Self {
        self.hard_expiry = Some(expiry);
        self
    }

    fn is_stale(&self, ticket: &Ticket) -> bool {
        self.hard_expiry
            .is_some_and(|expiry| ticket.acquired_at.elapsed() >= expiry)
    }

    fn issue(&self) -> Ticket {
        Ticket {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            acquired_at: Instant::now(),
        }
    }
}

impl Default for InMemoryLockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LockBackend for InMemoryLockBackend {
    fn try_acquire(&self, key: &Fingerprint) -> Option<u64> {
        match self.tickets.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                let ticket = self.issue();
                let id = ticket.id;
                vacant.insert(ticket);
                Some(id)
            }
            Entry::Occupied(mut occupied) => {
                if !self.is_stale(occupied.get()) {
                    return None;
                }
                let held_for = occupied.get().acquired_at.elapsed();
                tracing::warn!(
                    fingerprint = %key,
                    held_ms = u64::try_from(held_for.as_millis()).unwrap_or(u64::MAX),
                    "forcing release of stale lock ticket"
                );
                let ticket = self.issue();
                let id = ticket.id;
                occupied.insert(ticket);
                Some(id)
            }
        }
    }

    fn release(&self, key: &Fingerprint, ticket: u64) -> bool {
        self.tickets
            .remove_if(key, |_, held| held.id == ticket)
            .is_some()
    }

    fn purge_expired(&self) -> usize {
        if self.hard_expiry.is_none() {
            return 0;
        }
        let before = self.tickets.len();
        self.tickets.retain(|key, ticket| {
            let stale = self.is_stale(ticket);
            if stale {
                tracing::warn!(fingerprint = %key, "purging stale lock ticket");
            }
            !stale
        });
        before.saturating_sub(self.tickets.len())
    }

    fn is_held(&self, key: &Fingerprint) -> bool {
        self.tickets
            .get(key)
            .is_some_and(|ticket| !self.is_stale(&ticket))
    }

    fn held(&self) -> usize {
        self.tickets.len()
    }
}

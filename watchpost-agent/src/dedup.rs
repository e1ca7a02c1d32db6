//! Notification deduplication
//!
//! TTL cache keyed by target identifier. A target with a live entry is not
//! notified again until the entry expires; expired entries are ignored on
//! lookup and swept periodically by a janitor task.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// How often the janitor removes expired entries
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    /// target id -> expiry, `None` when the TTL reaches past the clock's range
    entries: Mutex<HashMap<String, Option<Instant>>>,
}

fn is_live(expires_at: &Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| at > now)
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` and records `target_id` if it has no live entry.
    ///
    /// Lookup and insert happen under one lock so concurrent failures for
    /// the same target yield a single `true`.
    pub fn should_notify(&self, target_id: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(target_id).is_some_and(|at| is_live(at, now)) {
            return false;
        }

        entries.insert(target_id.to_string(), now.checked_add(self.ttl));
        true
    }

    pub fn contains(&self, target_id: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(target_id)
            .is_some_and(|expires_at| is_live(expires_at, now))
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, expires_at| is_live(expires_at, now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Sweep expired entries every `every` until the cache is dropped
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired notification entries", purged);
                }
            }
        })
    }
}

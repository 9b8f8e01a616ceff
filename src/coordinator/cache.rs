//! Process-local advisory cache.

use crate::clock::{Clock, to_chrono};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Entry {
    stamp: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Timestamps remembered per key until they expire.
///
/// One instance is meant to be shared (behind an `Arc`) by every coordinator
/// in a process. The cache only ever short-circuits to a refusal; it is never
/// evidence that a lease is held.
pub struct LocalCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl LocalCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record that `key` last executed at `last_executed`, valid for `window`
    /// after that instant. Entries that would already be expired are dropped.
    pub fn remember(&self, key: &str, last_executed: DateTime<Utc>, window: Duration) {
        let expires_at = last_executed + to_chrono(window);
        let mut entries = self.entries.lock();
        if expires_at > self.clock.now() {
            entries.insert(
                key.to_string(),
                Entry {
                    stamp: last_executed,
                    expires_at,
                },
            );
        } else {
            entries.remove(key);
        }
    }

    /// The remembered timestamp for `key`, if it has not expired.
    pub fn last_executed(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.stamp),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Mark `key` as in flight for at most `ttl`, unless a live mark exists.
    ///
    /// Returns whether this call placed the mark.
    pub fn try_mark(&self, key: &str, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| e.expires_at > now) {
            return false;
        }
        entries.insert(
            key.to_string(),
            Entry {
                stamp: now,
                expires_at: now + to_chrono(ttl),
            },
        );
        true
    }

    pub fn forget(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

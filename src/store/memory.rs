//! In-process store backend.
//!
//! Implements the full [`Connection`] contract with the same observable
//! semantics as the Redis backend: per-key revisions drive optimistic watches,
//! TTLs are evaluated lazily against the injected clock, and scripts run
//! natively while the store mutex is held so they are atomic.

use super::{Command, Connection, Script, Store};
use crate::clock::{Clock, SystemClock, to_chrono};
use crate::error::{KeeperError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// Last revision at which each key was modified. Absent keys keep an
    /// entry only while some connection watches them.
    revisions: HashMap<String, u64>,
    next_revision: u64,
    /// Number of armed watches per key, across all connections.
    watchers: HashMap<String, usize>,
}

fn wrong_type(key: &str) -> KeeperError {
    KeeperError::StoreCommand(format!(
        "WRONGTYPE operation against key '{}' holding the wrong kind of value",
        key
    ))
}

impl State {
    fn touch(&mut self, key: &str) {
        self.next_revision += 1;
        self.revisions.insert(key.to_string(), self.next_revision);
    }

    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    /// `key` just stopped existing.
    fn vanish(&mut self, key: &str) {
        if self.watchers.contains_key(key) {
            self.touch(key);
        } else {
            self.revisions.remove(key);
        }
    }

    fn arm_watch(&mut self, key: &str) {
        *self.watchers.entry(key.to_string()).or_insert(0) += 1;
    }

    fn disarm_watch(&mut self, key: &str) {
        let Some(count) = self.watchers.get_mut(key) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.watchers.remove(key);
            if !self.entries.contains_key(key) {
                self.revisions.remove(key);
            }
        }
    }

    /// Drop `key` if its TTL has elapsed.
    fn expire(&mut self, key: &str, now: DateTime<Utc>) {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
            self.vanish(key);
        }
    }

    fn exists(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        self.expire(key, now);
        self.entries.contains_key(key)
    }

    fn get_str(&mut self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        self.expire(key, now);
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn set_str(&mut self, key: &str, value: &str, ttl: Option<Duration>, now: DateTime<Utc>) {
        if ttl.is_some_and(|t| t.is_zero()) {
            self.remove(key, now);
            return;
        }
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: ttl.map(|t| now + to_chrono(t)),
            },
        );
        self.touch(key);
    }

    fn remove(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        self.expire(key, now);
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.vanish(key);
        }
        existed
    }

    fn members(&mut self, key: &str, now: DateTime<Utc>) -> Result<HashSet<String>> {
        self.expire(key, now);
        match self.entries.get(key) {
            None => Ok(HashSet::new()),
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.clone()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn ensure_set_or_absent(&mut self, key: &str, now: DateTime<Utc>) -> Result<()> {
        self.expire(key, now);
        match self.entries.get(key) {
            None
            | Some(Entry {
                value: Value::Set(_),
                ..
            }) => Ok(()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    /// SADD for a key already checked with `ensure_set_or_absent`.
    fn set_add(&mut self, key: &str, member: &str) -> bool {
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Set(HashSet::new()),
            expires_at: None,
        });
        let added = match &mut entry.value {
            Value::Set(members) => members.insert(member.to_string()),
            Value::Str(_) => false,
        };
        if added {
            self.touch(key);
        }
        added
    }

    /// SREM; an emptied set disappears, as on a Redis server.
    fn set_remove(&mut self, key: &str, member: &str) -> bool {
        let (removed, now_empty) = match self.entries.get_mut(key) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                let removed = members.remove(member);
                (removed, members.is_empty())
            }
            _ => (false, false),
        };
        if now_empty {
            self.entries.remove(key);
            self.vanish(key);
        } else if removed {
            self.touch(key);
        }
        removed
    }

    fn add_with_tags(&mut self, keys: &[String], args: &[String], now: DateTime<Utc>) -> Result<i64> {
        let (key, registry, tag_keys) = match keys {
            [key, registry, tags @ ..] => (key, registry, tags),
            _ => {
                return Err(KeeperError::StoreCommand(
                    "add_with_tags requires a value key and a registry key".to_string(),
                ));
            }
        };
        let value = args.first().ok_or_else(|| {
            KeeperError::StoreCommand("add_with_tags requires a value argument".to_string())
        })?;
        let ttl = match args.get(1) {
            Some(ms) => Some(Duration::from_millis(ms.parse::<u64>().map_err(|_| {
                KeeperError::StoreCommand(format!("add_with_tags: invalid TTL '{}'", ms))
            })?)),
            None => None,
        };

        self.ensure_set_or_absent(registry, now)?;
        for tag_key in tag_keys {
            self.ensure_set_or_absent(tag_key, now)?;
        }

        self.set_str(key, value, ttl, now);
        let mut added = 0;
        for tag_key in tag_keys {
            if self.set_add(tag_key, key) {
                added += 1;
            }
            self.set_add(registry, tag_key);
        }
        Ok(added)
    }

    fn cleanup_tags(&mut self, keys: &[String], now: DateTime<Utc>) -> Result<i64> {
        let registry = keys.first().ok_or_else(|| {
            KeeperError::StoreCommand("cleanup_tags requires a registry key".to_string())
        })?;

        let mut removed = 0;
        for tag_key in self.members(registry, now)? {
            for member in self.members(&tag_key, now)? {
                if !self.exists(&member, now) && self.set_remove(&tag_key, &member) {
                    removed += 1;
                }
            }
            if !self.exists(&tag_key, now) {
                self.set_remove(registry, &tag_key);
            }
        }
        Ok(removed)
    }
}

struct Shared {
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
}

/// A thread-safe, in-process store.
///
/// Clones share the same data, so a clone handed to another thread behaves
/// like a second client of the same server.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create an empty store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store whose TTLs are evaluated against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                clock,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate an outage: while unavailable every call fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys.
    pub fn key_count(&self) -> usize {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        let keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.iter().filter(|k| state.exists(k, now)).count()
    }

    #[cfg(test)]
    pub(crate) fn tracked_revisions(&self) -> usize {
        self.shared.state.lock().revisions.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("available", &self.shared.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Store for MemoryStore {
    type Conn = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection> {
        self.check()?;
        Ok(MemoryConnection {
            shared: Arc::clone(&self.shared),
            watched: Vec::new(),
        })
    }
}

impl MemoryStore {
    fn check(&self) -> Result<()> {
        check_available(&self.shared)
    }
}

fn check_available(shared: &Shared) -> Result<()> {
    if shared.available.load(Ordering::SeqCst) {
        Ok(())
    } else {
        Err(KeeperError::StoreUnavailable(
            "memory store is offline".to_string(),
        ))
    }
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    shared: Arc<Shared>,
    /// Keys watched on this connection with the revision observed at watch time.
    watched: Vec<(String, u64)>,
}

impl MemoryConnection {
    fn with_state<T>(&mut self, f: impl FnOnce(&mut State, DateTime<Utc>) -> Result<T>) -> Result<T> {
        check_available(&self.shared)?;
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        f(&mut state, now)
    }

    fn clear_watches(&mut self) {
        if self.watched.is_empty() {
            return;
        }
        let mut state = self.shared.state.lock();
        for (key, _) in self.watched.drain(..) {
            state.disarm_watch(&key);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.clear_watches();
    }
}

impl Connection for MemoryConnection {
    fn get(&mut self, key: &str) -> Result<Option<String>> {
        self.with_state(|state, now| state.get_str(key, now))
    }

    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.with_state(|state, now| {
            state.set_str(key, value, ttl, now);
            Ok(())
        })
    }

    fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool> {
        self.with_state(|state, now| {
            if state.exists(key, now) {
                return Ok(false);
            }
            state.set_str(key, value, None, now);
            Ok(true)
        })
    }

    fn get_and_set(&mut self, key: &str, value: &str) -> Result<Option<String>> {
        self.with_state(|state, now| {
            let previous = state.get_str(key, now)?;
            state.set_str(key, value, None, now);
            Ok(previous)
        })
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        self.with_state(|state, now| Ok(state.remove(key, now)))
    }

    fn watch(&mut self, key: &str) -> Result<()> {
        let revision = self.with_state(|state, now| {
            state.expire(key, now);
            state.arm_watch(key);
            Ok(state.revision(key))
        })?;
        self.watched.push((key.to_string(), revision));
        Ok(())
    }

    fn unwatch(&mut self) -> Result<()> {
        check_available(&self.shared)?;
        self.clear_watches();
        Ok(())
    }

    fn transaction(&mut self, commands: &[Command]) -> Result<bool> {
        let watched = std::mem::take(&mut self.watched);
        let result = self.with_state(|state, now| {
            let mut intact = true;
            for (key, revision) in &watched {
                state.expire(key, now);
                intact &= state.revision(key) == *revision;
                state.disarm_watch(key);
            }
            if !intact {
                return Ok(false);
            }
            for command in commands {
                match command {
                    Command::Set { key, value, ttl } => state.set_str(key, value, *ttl, now),
                    Command::Remove { key } => {
                        state.remove(key, now);
                    }
                }
            }
            Ok(true)
        });
        if result.is_err() {
            self.watched = watched;
            self.clear_watches();
        }
        result
    }

    fn exec_script(&mut self, script: Script, keys: &[String], args: &[String]) -> Result<i64> {
        self.with_state(|state, now| match script {
            Script::AddWithTags => state.add_with_tags(keys, args, now),
            Script::CleanupTags => state.cleanup_tags(keys, now),
        })
    }

    fn all_members_of_set(&mut self, set_key: &str) -> Result<HashSet<String>> {
        self.with_state(|state, now| state.members(set_key, now))
    }

    fn union_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>> {
        self.with_state(|state, now| {
            let mut union = HashSet::new();
            for key in set_keys {
                union.extend(state.members(key, now)?);
            }
            Ok(union)
        })
    }

    fn intersection_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>> {
        self.with_state(|state, now| {
            let mut keys = set_keys.iter();
            let Some(first) = keys.next() else {
                return Ok(HashSet::new());
            };
            let mut intersection = state.members(first, now)?;
            for key in keys {
                let members = state.members(key, now)?;
                intersection.retain(|m| members.contains(m));
            }
            Ok(intersection)
        })
    }
}

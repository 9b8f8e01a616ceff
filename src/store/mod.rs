//! Capability surface over the shared key-value store.
//!
//! Everything above this module (leases, tags, the coordinator) talks to the
//! store only through [`Connection`]. A [`Store`] hands out connections; watch
//! state is scoped to a connection, the way it is scoped to a client
//! connection on a Redis server.
//!
//! Every operation may fail with [`KeeperError::StoreUnavailable`], which is
//! distinct from the logical "not found" answer (`Ok(None)` / `Ok(false)`).
//!
//! [`KeeperError::StoreUnavailable`]: crate::error::KeeperError::StoreUnavailable

mod memory;
mod redis_store;
mod scripts;


use crate::error::Result;
use std::collections::HashSet;
use std::time::Duration;

pub use self::memory::{MemoryConnection, MemoryStore};
pub use self::redis_store::{RedisConnection, RedisStore};
pub use self::scripts::Script;

/// A command queued inside an optimistic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write `value` under `key`, optionally expiring after `ttl`.
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    /// Delete `key`.
    Remove { key: String },
}

impl Command {
    pub fn set(key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Command::Remove { key: key.into() }
    }
}

/// A session against the shared store.
pub trait Connection: Send {
    /// Read a string value.
    fn get(&mut self, key: &str) -> Result<Option<String>>;

    /// Write a string value, optionally with a store-side TTL.
    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write only if the key does not exist. Returns whether the write happened.
    fn set_if_absent(&mut self, key: &str, value: &str) -> Result<bool>;

    /// Write and return the previous value.
    fn get_and_set(&mut self, key: &str, value: &str) -> Result<Option<String>>;

    /// Delete a key. Returns whether it existed.
    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Watch a key for the next [`Connection::transaction`].
    fn watch(&mut self, key: &str) -> Result<()>;

    /// Drop all watches armed on this connection.
    fn unwatch(&mut self) -> Result<()>;

    /// Apply `commands` atomically.
    ///
    /// Returns `false` without applying anything if a watched key changed since
    /// it was watched. Watches are cleared either way.
    fn transaction(&mut self, commands: &[Command]) -> Result<bool>;

    /// Run one of the known server-side scripts atomically.
    fn exec_script(&mut self, script: Script, keys: &[String], args: &[String]) -> Result<i64>;

    /// All members of a set (empty if the set does not exist).
    fn all_members_of_set(&mut self, set_key: &str) -> Result<HashSet<String>>;

    /// Union of several sets.
    fn union_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>>;

    /// Intersection of several sets.
    fn intersection_of_sets(&mut self, set_keys: &[String]) -> Result<HashSet<String>>;
}

/// A shared store that can open connections.
pub trait Store: Send + Sync {
    type Conn: Connection;

    fn connect(&self) -> Result<Self::Conn>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    type Conn = S::Conn;

    fn connect(&self) -> Result<Self::Conn> {
        (**self).connect()
    }
}

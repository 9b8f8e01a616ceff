//! The lease handle and its lifecycle operations.

use super::token::FencingToken;
use crate::error::{KeeperError, Result};
use crate::store::{Command, Connection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// A lease on a logical key.
///
/// Created by [`crate::lease::Locker::acquire`]. A lease moves from acquired
/// to released exactly once; after that every mutating operation fails with
/// `InvalidOperation`. Leases are not `Clone`: the holder owns it outright.
#[derive(Debug)]
pub struct Lease {
    key: String,
    lock_key: String,
    token: FencingToken,
    acquired: bool,
    released: bool,
}

impl Lease {
    pub(super) fn new(key: String, lock_key: String, token: FencingToken, acquired: bool) -> Self {
        Self {
            key,
            lock_key,
            token,
            acquired,
            released: false,
        }
    }

    /// The logical key (also the key of the protected value).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The namespaced key holding the lock entry.
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn fencing_token(&self) -> FencingToken {
        self.token
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// True once released explicitly, or once found superseded or missing.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// When this lease stops being live if nobody supersedes it first.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.expires_at()
    }

    /// Verify the lock entry still carries this lease's token.
    ///
    /// With `require_watch`, a watch on the lock key is left armed when the
    /// lease is valid so the caller's next transaction aborts if the lock
    /// changes in between; the caller must follow up with a transaction or
    /// an unwatch.
    ///
    /// A released lease passes trivially; callers that mutate check
    /// [`Lease::is_released`] separately. Otherwise the lease is marked
    /// released permanently and:
    /// - a missing entry raises `LockNotFound`,
    /// - a non-integer or older token raises `LockCorrupted`,
    /// - a newer token raises `LockExpired`.
    pub fn assert_valid<C: Connection + ?Sized>(
        &mut self,
        conn: &mut C,
        require_watch: bool,
    ) -> Result<()> {
        if !self.acquired {
            return Err(KeeperError::InvalidOperation(
                "you cannot operate on a lease which was not acquired".to_string(),
            ));
        }
        if self.released {
            return Ok(());
        }

        if require_watch {
            conn.watch(&self.lock_key)?;
        }
        let current = match conn.get(&self.lock_key) {
            Ok(current) => current,
            Err(e) => {
                if require_watch {
                    let _ = conn.unwatch();
                }
                return Err(e);
            }
        };
        let expected = self.token.to_string();
        if current.as_deref() == Some(expected.as_str()) {
            return Ok(());
        }
        if require_watch {
            let _ = conn.unwatch();
        }

        self.released = true;
        let lock = self.to_string();
        let fault = match current {
            None => KeeperError::LockNotFound { lock },
            Some(found) => match FencingToken::parse(&found) {
                Some(stored) if stored > self.token => KeeperError::LockExpired {
                    lock,
                    newer_by_ms: stored.value() - self.token.value(),
                },
                _ => KeeperError::LockCorrupted {
                    lock,
                    found,
                    expected,
                },
            },
        };
        warn!(lock_key = %self.lock_key, error = %fault, "lease is no longer valid");
        Err(fault)
    }

    fn assert_not_released(&self, op: &str) -> Result<()> {
        if self.released {
            return Err(KeeperError::InvalidOperation(format!(
                "you cannot perform this operation ({}) once the lease has been released",
                op
            )));
        }
        Ok(())
    }

    /// Read the protected value stored under the lease's key.
    pub fn get_value<T, C>(&mut self, conn: &mut C) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        C: Connection + ?Sized,
    {
        self.assert_valid(conn, false)?;
        self.assert_not_released("get_value")?;
        match conn.get(&self.key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write the protected value without releasing the lease.
    ///
    /// Returns `false` if the lock changed between validation and commit.
    pub fn put_value<T, C>(&mut self, conn: &mut C, value: &T, ttl: Option<Duration>) -> Result<bool>
    where
        T: Serialize,
        C: Connection + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        self.assert_valid(conn, true)?;
        self.assert_not_released("put_value")?;
        conn.transaction(&[Command::set(&self.key, payload, ttl)])
    }

    /// Write the protected value and remove the lock in one transaction.
    ///
    /// Returns whether the lease is now released. Store failures are logged
    /// and reported as `Ok(false)` so the caller's scoped release still runs.
    pub fn put_and_release<T, C>(
        &mut self,
        conn: &mut C,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool>
    where
        T: Serialize,
        C: Connection + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        self.commit_and_release(
            conn,
            "put_and_release",
            vec![
                Command::set(&self.key, payload, ttl),
                Command::remove(&self.lock_key),
            ],
        )
    }

    /// Delete the protected value and remove the lock in one transaction.
    pub fn delete_and_release<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<bool> {
        self.commit_and_release(
            conn,
            "delete_and_release",
            vec![Command::remove(&self.key), Command::remove(&self.lock_key)],
        )
    }

    fn commit_and_release<C: Connection + ?Sized>(
        &mut self,
        conn: &mut C,
        op: &str,
        commands: Vec<Command>,
    ) -> Result<bool> {
        match self.assert_valid(conn, true) {
            Ok(()) => {}
            Err(e @ (KeeperError::StoreUnavailable(_) | KeeperError::StoreCommand(_))) => {
                warn!(lease = %self, error = %e, "{} could not validate the lease", op);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        self.assert_not_released(op)?;

        match conn.transaction(&commands) {
            Ok(true) => {
                self.released = true;
                debug!(lease = %self, "{} committed", op);
            }
            Ok(false) => debug!(lease = %self, "{} aborted: lock changed", op),
            Err(e) => warn!(lease = %self, error = %e, "{} failed", op),
        }
        Ok(self.released)
    }

    /// Release the lease.
    ///
    /// Idempotent and infallible: the lease counts as released afterwards no
    /// matter what the store says. The lock entry is deleted only if it still
    /// carries this lease's token.
    pub fn release<C: Connection + ?Sized>(&mut self, conn: &mut C) {
        if self.released {
            return;
        }
        self.released = true;
        if !self.acquired {
            return;
        }
        if let Err(e) = self.remove_if_current(conn) {
            warn!(lease = %self, error = %e, "failed to release lease");
        }
    }

    fn remove_if_current<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<()> {
        conn.watch(&self.lock_key)?;
        let current = conn.get(&self.lock_key)?;
        if current.as_deref() != Some(self.token.to_string().as_str()) {
            // Superseded or gone: nothing of ours to delete.
            conn.unwatch()?;
            debug!(lease = %self, "release skipped, lock no longer ours");
            return Ok(());
        }
        if !conn.transaction(&[Command::remove(&self.lock_key)])? {
            debug!(lease = %self, "release aborted, lock changed concurrently");
        }
        Ok(())
    }
}

impl std::fmt::Display for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lease:{}:{}", self.key, self.token)
    }
}

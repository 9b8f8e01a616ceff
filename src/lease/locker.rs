//! Lease acquisition.

use super::backoff::Backoff;
use super::guard::LeaseGuard;
use super::inspect::LockStatus;
use super::lock::Lease;
use super::token::FencingToken;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{KeeperError, Result};
use crate::store::{Command, Connection};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Namespace for lock entries.
pub const DEFAULT_LOCK_PREFIX: &str = "dlmlock:";

/// How long a lease lasts when the caller does not say.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(2 * 60 * 60);

/// How long to keep trying when the caller does not say.
pub const DEFAULT_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(30);

/// Acquires leases.
///
/// Holds what every acquisition needs besides the connection: the clock that
/// fencing tokens are derived from, the lock key namespace, and the backoff
/// policy between attempts.
#[derive(Clone)]
pub struct Locker {
    clock: Arc<dyn Clock>,
    prefix: String,
    backoff: Backoff,
}

/// Outcome of a single acquisition attempt.
enum Attempt {
    Acquired,
    Contended,
}

impl Locker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            prefix: DEFAULT_LOCK_PREFIX.to_string(),
            backoff: Backoff::default(),
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(clock).with_prefix(config.lock_prefix.clone())
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The namespaced key of the lock entry for `key`.
    pub fn lock_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Try to acquire a lease on `key` for `lease_duration`.
    ///
    /// Keeps trying until `acquisition_timeout` has elapsed; at least one
    /// attempt is always made. Running out of time is not an error: check
    /// [`Lease::is_acquired`] on the result. Store failures during the loop
    /// count as failed attempts.
    pub fn acquire<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        key: &str,
        lease_duration: Duration,
        acquisition_timeout: Duration,
    ) -> Result<Lease> {
        if key.is_empty() {
            return Err(KeeperError::InvalidOperation(
                "cannot acquire a lease on an empty key".to_string(),
            ));
        }

        let lock_key = self.lock_key(key);
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let token = FencingToken::for_lease(self.clock.now(), lease_duration);

            match self.try_acquire(conn, &lock_key, token) {
                Ok(Attempt::Acquired) => {
                    debug!(key, token = %token, attempts = attempt, "lease acquired");
                    return Ok(Lease::new(key.to_string(), lock_key, token, true));
                }
                Ok(Attempt::Contended) => {}
                Err(e) => debug!(key, attempts = attempt, error = %e, "lease attempt failed"),
            }

            std::thread::sleep(self.backoff.delay(attempt));
            if started.elapsed() >= acquisition_timeout {
                debug!(key, attempts = attempt, "lease not acquired before timeout");
                return Ok(Lease::new(key.to_string(), lock_key, token, false));
            }
        }
    }

    /// Acquire and wrap the lease in a guard, or `None` on timeout.
    pub fn lock<'c, C: Connection + ?Sized>(
        &self,
        conn: &'c mut C,
        key: &str,
        lease_duration: Duration,
        acquisition_timeout: Duration,
    ) -> Result<Option<LeaseGuard<'c, C>>> {
        let lease = self.acquire(conn, key, lease_duration, acquisition_timeout)?;
        if lease.is_acquired() {
            Ok(Some(LeaseGuard::new(conn, lease)))
        } else {
            Ok(None)
        }
    }

    /// Like [`Locker::lock`], but a timeout is reported as `LockNotAcquired`.
    pub fn lock_or_fail<'c, C: Connection + ?Sized>(
        &self,
        conn: &'c mut C,
        key: &str,
        lease_duration: Duration,
        acquisition_timeout: Duration,
    ) -> Result<LeaseGuard<'c, C>> {
        self.lock(conn, key, lease_duration, acquisition_timeout)?
            .ok_or_else(|| KeeperError::LockNotAcquired {
                key: key.to_string(),
                timeout_ms: u64::try_from(acquisition_timeout.as_millis()).unwrap_or(u64::MAX),
            })
    }

    fn try_acquire<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        lock_key: &str,
        token: FencingToken,
    ) -> Result<Attempt> {
        let ours = token.to_string();
        if conn.set_if_absent(lock_key, &ours)? {
            return Ok(Attempt::Acquired);
        }

        // The lock exists: either held, or abandoned by a holder that never released it.
        let Some(existing) = conn.get(lock_key)? else {
            return Ok(Attempt::Contended);
        };
        let Some(existing_token) = FencingToken::parse(&existing) else {
            return Ok(Attempt::Contended);
        };
        if existing_token.is_live_at(self.clock.now_ms()) {
            return Ok(Attempt::Contended);
        }

        // Expired: swap in our token and keep it only if nobody beat us to it.
        match conn.get_and_set(lock_key, &ours)? {
            Some(displaced) if displaced == existing => {
                info!(lock_key, expired = %existing, token = %token, "took over an expired lease");
                Ok(Attempt::Acquired)
            }
            // The expired holder released in between; our GETSET claimed a free key.
            None => {
                debug!(lock_key, expired = %existing, "expired lease vanished before takeover");
                Ok(Attempt::Acquired)
            }
            // We lost the race but our GETSET overwrote the winner's token; hand it back.
            Some(winner) => {
                self.restore(conn, lock_key, &ours, &winner)?;
                Ok(Attempt::Contended)
            }
        }
    }

    fn restore<C: Connection + ?Sized>(
        &self,
        conn: &mut C,
        lock_key: &str,
        ours: &str,
        winner: &str,
    ) -> Result<()> {
        conn.watch(lock_key)?;
        if conn.get(lock_key)?.as_deref() != Some(ours) {
            conn.unwatch()?;
            return Ok(());
        }
        let restored = conn.transaction(&[Command::set(lock_key, winner, None)])?;
        debug!(lock_key, restored, "lost takeover race");
        Ok(())
    }

    /// Describe the lock entry for `key`, if any.
    pub fn inspect<C: Connection + ?Sized>(&self, conn: &mut C, key: &str) -> Result<Option<LockStatus>> {
        let lock_key = self.lock_key(key);
        let raw = conn.get(&lock_key)?;
        Ok(raw.map(|raw| LockStatus::evaluate(key, lock_key, raw, self.clock.now())))
    }

    /// Forcibly delete the lock entry for `key`, returning what was removed.
    ///
    /// This bypasses fencing entirely: the current holder, if any, will find
    /// its lease missing on its next validation.
    pub fn clear<C: Connection + ?Sized>(&self, conn: &mut C, key: &str) -> Result<Option<LockStatus>> {
        let status = self.inspect(conn, key)?;
        if let Some(status) = &status {
            conn.remove(&status.lock_key)?;
            info!(lock_key = %status.lock_key, "lock cleared");
        }
        Ok(status)
    }
}

impl std::fmt::Debug for Locker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("prefix", &self.prefix)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

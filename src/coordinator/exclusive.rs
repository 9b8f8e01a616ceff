//! Exclusive (mutex) execution: at most one run in flight, no rate limit.

use super::admission::{Admission, Detached};
use super::gated::{fault, refused};
use super::key::{MUTEX_PREFIX, OperationKey};
use super::outcome::{Outcome, Refusal};
use super::service::Coordinator;
use crate::store::Store;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

impl<S: Store> Coordinator<S> {
    /// Run `op` unless it is already running here or elsewhere.
    ///
    /// A local in-flight mark short-circuits re-entrant and concurrent calls
    /// from this process; otherwise the lease on `Mutex-{key}` must be
    /// acquired within the mutex acquisition budget. The mark and the lease
    /// are both cleared when `op` returns or panics.
    pub fn execute_exclusive<F, E>(&self, key: &OperationKey, lease_duration: Duration, op: F) -> Outcome
    where
        F: FnOnce() -> Result<bool, E>,
        E: Display,
    {
        let storage_key = key.prefixed(MUTEX_PREFIX);
        let admission = match self.admit_exclusive(&storage_key, lease_duration) {
            Ok(admission) => admission,
            Err(refusal) => return refused(&storage_key, refusal),
        };

        let outcome = Outcome::from_result(op());
        if let Outcome::Failed { error } = &outcome {
            warn!(key = %storage_key, error = %error, "guarded operation failed");
        }
        drop(admission);
        outcome
    }

    pub fn run_exclusive<F, E>(&self, key: &OperationKey, lease_duration: Duration, op: F) -> bool
    where
        F: FnOnce() -> Result<bool, E>,
        E: Display,
    {
        self.execute_exclusive(key, lease_duration, op).is_success()
    }

    /// Async form of [`Coordinator::execute_exclusive`].
    ///
    /// Cancelling it while `op` is pending clears the mark and releases the
    /// lease on the blocking pool.
    pub async fn execute_exclusive_async<F, Fut, E>(
        &self,
        key: &OperationKey,
        lease_duration: Duration,
        op: F,
    ) -> Outcome
    where
        S: Clone + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let storage_key = key.prefixed(MUTEX_PREFIX);
        let this = self.clone();
        let admit_key = storage_key.clone();
        let admission =
            match tokio::task::spawn_blocking(move || this.admit_exclusive(&admit_key, lease_duration)).await {
                Ok(Ok(admission)) => admission,
                Ok(Err(refusal)) => return refused(&storage_key, refusal),
                Err(e) => {
                    return refused(&storage_key, Refusal::Fault(format!("admission task failed: {}", e)));
                }
            };

        let mut pending = Detached::new(admission);
        let outcome = Outcome::from_result(op().await);
        if let Outcome::Failed { error } = &outcome {
            warn!(key = %storage_key, error = %error, "guarded operation failed");
        }
        if let Some(admission) = pending.take() {
            if let Err(e) = tokio::task::spawn_blocking(move || drop(admission)).await {
                warn!(key = %storage_key, error = %e, "release task failed");
            }
        }
        outcome
    }

    pub async fn run_exclusive_async<F, Fut, E>(&self, key: &OperationKey, lease_duration: Duration, op: F) -> bool
    where
        S: Clone + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        self.execute_exclusive_async(key, lease_duration, op)
            .await
            .is_success()
    }

    fn admit_exclusive(&self, key: &str, lease_duration: Duration) -> Result<Admission<S::Conn>, Refusal> {
        if !self.cache.try_mark(key, lease_duration) {
            return Err(Refusal::AlreadyRunning);
        }

        let attempt = || -> Result<Admission<S::Conn>, Refusal> {
            let mut conn = self.store.connect().map_err(fault)?;
            let lease = self
                .locker
                .acquire(&mut conn, key, lease_duration, self.mutex_timeout)
                .map_err(fault)?;
            if !lease.is_acquired() {
                return Err(Refusal::LeaseUnavailable);
            }
            Ok(Admission::new(conn, lease))
        };

        match attempt() {
            Ok(admission) => Ok(admission.with_mark(self.cache.clone(), key)),
            Err(refusal) => {
                self.cache.forget(key);
                Err(refusal)
            }
        }
    }
}

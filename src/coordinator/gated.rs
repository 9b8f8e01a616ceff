//! Rate-gated single-flight execution.

use super::admission::{Admission, Detached};
use super::key::{FREQUENCY_PREFIX, OperationKey};
use super::outcome::{GatePolicy, Outcome, Refusal};
use super::service::Coordinator;
use super::tracker::TrackerRecord;
use crate::clock::to_chrono;
use crate::store::Store;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

impl<S: Store> Coordinator<S> {
    /// Run `op` unless it is in flight elsewhere or ran within the window.
    ///
    /// 1. A local cache hit younger than the window refuses without touching
    ///    the store.
    /// 2. The lease on `Frequency-{key}` must be acquired within the gate
    ///    acquisition budget.
    /// 3. The shared tracker must be absent, or the lease duration must have
    ///    elapsed since its `last_executed`. The tracker lives for the window,
    ///    so another host may run once the previous lease is over even if the
    ///    window is not; only this process's cache enforces the full window.
    /// 4. `op` runs. Its failure still counts as a run.
    /// 5. The tracker is rewritten with `last_executed = now` and a TTL of the
    ///    window in the same transaction that releases the lease, and the
    ///    local cache is updated to match.
    ///
    /// With a zero window only step 2 applies. Faults never escape: they are
    /// logged and reported as [`Outcome::Refused`].
    pub fn execute<F, E>(&self, key: &OperationKey, policy: GatePolicy, op: F) -> Outcome
    where
        F: FnOnce() -> Result<bool, E>,
        E: Display,
    {
        let storage_key = key.prefixed(FREQUENCY_PREFIX);
        let admission = match self.admit_gated(&storage_key, policy) {
            Ok(admission) => admission,
            Err(refusal) => return refused(&storage_key, refusal),
        };

        let outcome = Outcome::from_result(op());
        self.finish_gated(&storage_key, policy, admission, &outcome);
        outcome
    }

    /// [`Coordinator::execute`] reduced to "ran and succeeded".
    pub fn run<F, E>(&self, key: &OperationKey, policy: GatePolicy, op: F) -> bool
    where
        F: FnOnce() -> Result<bool, E>,
        E: Display,
    {
        self.execute(key, policy, op).is_success()
    }

    /// Async form of [`Coordinator::execute`].
    ///
    /// Store round trips run on tokio's blocking pool; `op`'s future is
    /// awaited on the caller's task. Dropping the returned future while `op`
    /// is pending releases the lease in the background without recording a
    /// run.
    pub async fn execute_async<F, Fut, E>(&self, key: &OperationKey, policy: GatePolicy, op: F) -> Outcome
    where
        S: Clone + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let storage_key = key.prefixed(FREQUENCY_PREFIX);
        if let Some(refusal) = self.check_local(&storage_key, policy) {
            return refused(&storage_key, refusal);
        }

        let this = self.clone();
        let admit_key = storage_key.clone();
        let admission = match tokio::task::spawn_blocking(move || this.admit_gated(&admit_key, policy)).await {
            Ok(Ok(admission)) => admission,
            Ok(Err(refusal)) => return refused(&storage_key, refusal),
            Err(e) => return refused(&storage_key, Refusal::Fault(format!("admission task failed: {}", e))),
        };

        let mut pending = Detached::new(admission);
        let outcome = Outcome::from_result(op().await);
        let Some(admission) = pending.take() else {
            return outcome;
        };

        let this = self.clone();
        let finished = outcome.clone();
        let finish_key = storage_key.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || {
            this.finish_gated(&finish_key, policy, admission, &finished)
        })
        .await
        {
            warn!(key = %storage_key, error = %e, "tracker update task failed");
        }
        outcome
    }

    /// Async form of [`Coordinator::run`].
    pub async fn run_async<F, Fut, E>(&self, key: &OperationKey, policy: GatePolicy, op: F) -> bool
    where
        S: Clone + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        self.execute_async(key, policy, op).await.is_success()
    }

    fn check_local(&self, key: &str, policy: GatePolicy) -> Option<Refusal> {
        if !policy.is_gated() {
            return None;
        }
        let last_executed = self.cache.last_executed(key)?;
        let next_allowed = last_executed + to_chrono(policy.frequency_window);
        (next_allowed > self.clock().now()).then_some(Refusal::RecentlyExecuted { last_executed })
    }

    fn admit_gated(&self, key: &str, policy: GatePolicy) -> Result<Admission<S::Conn>, Refusal> {
        if let Some(refusal) = self.check_local(key, policy) {
            return Err(refusal);
        }

        let mut conn = self.store.connect().map_err(fault)?;
        let lease = self
            .locker
            .acquire(&mut conn, key, policy.lease_duration, self.gate_timeout)
            .map_err(fault)?;
        if !lease.is_acquired() {
            return Err(Refusal::LeaseUnavailable);
        }
        let mut admission = Admission::new(conn, lease);
        if !policy.is_gated() {
            return Ok(admission);
        }

        let tracker: Option<TrackerRecord> = admission
            .lease
            .get_value(&mut admission.conn)
            .map_err(fault)?;
        if let Some(record) = tracker {
            let now = self.clock().now();
            if record.last_executed + to_chrono(policy.lease_duration) > now {
                debug!(key, owner = %record.owner, "previous run may still be in flight");
                // Only until the store would admit us again.
                let horizon = policy.lease_duration.min(policy.frequency_window);
                self.cache.remember(key, record.last_executed, horizon);
                return Err(Refusal::RecentlyExecuted {
                    last_executed: record.last_executed,
                });
            }
        }
        Ok(admission)
    }

    fn finish_gated(
        &self,
        key: &str,
        policy: GatePolicy,
        mut admission: Admission<S::Conn>,
        outcome: &Outcome,
    ) {
        if let Outcome::Failed { error } = outcome {
            warn!(key, error = %error, "guarded operation failed");
        }
        if !policy.is_gated() {
            return;
        }

        let record = TrackerRecord::new(self.clock().now());
        let window = policy.frequency_window;
        match admission
            .lease
            .put_and_release(&mut admission.conn, &record, Some(window))
        {
            Ok(true) => debug!(key, "run recorded"),
            Ok(false) => warn!(key, "run not recorded: lock changed or store failed"),
            Err(e) => warn!(key, error = %e, "run not recorded"),
        }
        self.cache.remember(key, record.last_executed, window);
    }
}

pub(super) fn fault(e: impl Display) -> Refusal {
    Refusal::Fault(e.to_string())
}

pub(super) fn refused(key: &str, refusal: Refusal) -> Outcome {
    match &refusal {
        Refusal::Fault(e) => warn!(key, error = %e, "invocation refused"),
        other => debug!(key, reason = %other, "invocation refused"),
    }
    Outcome::Refused(refusal)
}

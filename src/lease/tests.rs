//! Tests for the lease subsystem.

use super::*;
use crate::clock::{Clock, SystemClock};
use crate::error::KeeperError;
use crate::store::{Connection, MemoryConnection, MemoryStore, Script, Store};
use crate::test_support::{EPOCH_MS, Harness};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const LEASE: Duration = Duration::from_secs(10);
const NO_WAIT: Duration = Duration::ZERO;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    rows: u32,
}

#[test]
fn test_fencing_token_encodes_expiry_plus_one() {
    let h = Harness::new();
    let token = FencingToken::for_lease(h.clock.now(), LEASE);

    assert_eq!(token.value(), EPOCH_MS + 10_000 + 1);
    assert_eq!(token.to_string(), (EPOCH_MS + 10_001).to_string());
    assert_eq!(token.expires_at().unwrap().timestamp_millis(), EPOCH_MS + 10_000);
    assert_eq!(FencingToken::parse(&token.to_string()), Some(token));
    assert_eq!(FencingToken::parse("12abc"), None);
    assert_eq!(FencingToken::parse(""), None);
}

#[test]
fn test_later_tokens_supersede_earlier_ones() {
    let h = Harness::new();
    let first = FencingToken::for_lease(h.clock.now(), LEASE);
    h.clock.advance(Duration::from_millis(1));
    let second = FencingToken::for_lease(h.clock.now(), LEASE);
    assert!(second > first);
}

#[test]
fn test_backoff_delay_stays_within_quadratic_bounds() {
    assert_eq!(Backoff::bounds(1), (1, 4));
    assert_eq!(Backoff::bounds(3), (9, 16));

    let backoff = Backoff::new(Duration::from_micros(10));
    for attempt in 1..20 {
        let (low, high) = Backoff::bounds(attempt);
        let delay = backoff.delay(attempt);
        assert!(delay >= Duration::from_micros(10 * low));
        assert!(delay <= Duration::from_micros(10 * high));
    }
}

#[test]
fn test_acquire_free_key() {
    let h = Harness::new();
    let mut conn = h.conn();

    let lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    assert!(lease.is_acquired());
    assert!(!lease.is_released());
    assert_eq!(lease.lock_key(), "dlmlock:reports");
    assert_eq!(
        conn.get("dlmlock:reports").unwrap(),
        Some(lease.fencing_token().to_string())
    );
    assert_eq!(
        lease.to_string(),
        format!("Lease:reports:{}", lease.fencing_token())
    );
}

#[test]
fn test_acquire_empty_key_is_invalid() {
    let h = Harness::new();
    let mut conn = h.conn();

    let err = h.locker().acquire(&mut conn, "", LEASE, NO_WAIT).unwrap_err();
    assert!(matches!(err, KeeperError::InvalidOperation(_)));
}

#[test]
fn test_held_lease_blocks_second_acquirer() {
    let h = Harness::new();
    let mut first = h.conn();
    let mut second = h.conn();
    let locker = h.locker();

    let held = locker.acquire(&mut first, "reports", LEASE, NO_WAIT).unwrap();
    assert!(held.is_acquired());

    let other = locker.acquire(&mut second, "reports", LEASE, NO_WAIT).unwrap();
    assert!(!other.is_acquired());
    // The holder's entry is untouched.
    assert_eq!(
        second.get("dlmlock:reports").unwrap(),
        Some(held.fencing_token().to_string())
    );
}

#[test]
fn test_abandoned_lease_becomes_acquirable_only_after_expiry() {
    let h = Harness::new();
    let mut crashed = h.conn();
    let mut next = h.conn();
    let locker = h.locker();

    let abandoned = locker.acquire(&mut crashed, "reports", LEASE, NO_WAIT).unwrap();
    assert!(abandoned.is_acquired());
    std::mem::forget(abandoned);

    h.clock.advance(LEASE);
    let early = locker.acquire(&mut next, "reports", LEASE, NO_WAIT).unwrap();
    assert!(!early.is_acquired(), "lease must not be taken over at its expiry instant");

    h.clock.advance(Duration::from_millis(1));
    let late = locker.acquire(&mut next, "reports", LEASE, NO_WAIT).unwrap();
    assert!(late.is_acquired());
    assert_eq!(
        next.get("dlmlock:reports").unwrap(),
        Some(late.fencing_token().to_string())
    );
}

#[test]
fn test_superseded_holder_sees_lock_expired_and_cannot_release_new_holder() {
    let h = Harness::new();
    let mut stale_conn = h.conn();
    let mut fresh_conn = h.conn();
    let locker = h.locker();

    let mut stale = locker.acquire(&mut stale_conn, "reports", LEASE, NO_WAIT).unwrap();
    h.clock.advance(LEASE + Duration::from_millis(5));
    let fresh = locker.acquire(&mut fresh_conn, "reports", LEASE, NO_WAIT).unwrap();
    assert!(fresh.is_acquired());

    let err = stale.assert_valid(&mut stale_conn, false).unwrap_err();
    match err {
        KeeperError::LockExpired { newer_by_ms, .. } => assert_eq!(newer_by_ms, 10_005),
        other => panic!("expected LockExpired, got {other:?}"),
    }
    assert!(stale.is_released());

    stale.release(&mut stale_conn);
    assert_eq!(
        fresh_conn.get("dlmlock:reports").unwrap(),
        Some(fresh.fencing_token().to_string())
    );
}

#[test]
fn test_assert_valid_round_trips_under_no_contention() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    for _ in 0..5 {
        lease.assert_valid(&mut conn, false).unwrap();
        h.clock.advance(Duration::from_secs(1));
    }
    lease.assert_valid(&mut conn, true).unwrap();
    conn.unwatch().unwrap();
    assert!(!lease.is_released());
}

#[test]
fn test_assert_valid_detects_missing_lock() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    conn.remove("dlmlock:reports").unwrap();

    let err = lease.assert_valid(&mut conn, true).unwrap_err();
    assert!(matches!(err, KeeperError::LockNotFound { .. }));
    assert!(lease.is_released());
}

#[test]
fn test_assert_valid_detects_corruption() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker();

    let mut garbled = locker.acquire(&mut conn, "a", LEASE, NO_WAIT).unwrap();
    conn.set("dlmlock:a", "not-a-token", None).unwrap();
    let err = garbled.assert_valid(&mut conn, false).unwrap_err();
    assert!(matches!(err, KeeperError::LockCorrupted { .. }));
    assert!(garbled.is_released());

    let mut rewound = locker.acquire(&mut conn, "b", LEASE, NO_WAIT).unwrap();
    let older = rewound.fencing_token().value() - 1;
    conn.set("dlmlock:b", &older.to_string(), None).unwrap();
    let err = rewound.assert_valid(&mut conn, false).unwrap_err();
    assert!(matches!(err, KeeperError::LockCorrupted { .. }));
}

#[test]
fn test_put_and_get_value() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    assert_eq!(lease.get_value::<Report, _>(&mut conn).unwrap(), None);
    assert!(lease.put_value(&mut conn, &Report { rows: 3 }, None).unwrap());
    assert_eq!(
        lease.get_value::<Report, _>(&mut conn).unwrap(),
        Some(Report { rows: 3 })
    );
    // Still holding the lock.
    assert!(conn.get("dlmlock:reports").unwrap().is_some());
}

#[test]
fn test_put_and_release_writes_value_and_removes_lock() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    let released = lease
        .put_and_release(&mut conn, &Report { rows: 7 }, Some(Duration::from_secs(60)))
        .unwrap();
    assert!(released);
    assert!(lease.is_released());
    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);
    assert_eq!(conn.get("reports").unwrap().as_deref(), Some(r#"{"rows":7}"#));

    h.clock.advance(Duration::from_secs(60));
    assert_eq!(conn.get("reports").unwrap(), None);
}

#[test]
fn test_second_put_and_release_is_invalid_and_does_not_write() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    assert!(lease.put_and_release(&mut conn, &Report { rows: 1 }, None).unwrap());

    let err = lease
        .put_and_release(&mut conn, &Report { rows: 2 }, None)
        .unwrap_err();
    assert!(matches!(err, KeeperError::InvalidOperation(_)));
    assert_eq!(conn.get("reports").unwrap().as_deref(), Some(r#"{"rows":1}"#));

    let err = lease.put_value(&mut conn, &Report { rows: 3 }, None).unwrap_err();
    assert!(matches!(err, KeeperError::InvalidOperation(_)));
}

#[test]
fn test_delete_and_release() {
    let h = Harness::new();
    let mut conn = h.conn();
    conn.set("reports", r#"{"rows":9}"#, None).unwrap();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    assert!(lease.delete_and_release(&mut conn).unwrap());
    assert_eq!(conn.get("reports").unwrap(), None);
    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);

    let err = lease.delete_and_release(&mut conn).unwrap_err();
    assert!(matches!(err, KeeperError::InvalidOperation(_)));
}

#[test]
fn test_release_is_idempotent() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker();
    let mut lease = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    lease.release(&mut conn);
    assert!(lease.is_released());
    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);

    // Someone else takes the lock; a second release must not touch it.
    let other = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    assert!(other.is_acquired());
    lease.release(&mut conn);
    assert_eq!(
        conn.get("dlmlock:reports").unwrap(),
        Some(other.fencing_token().to_string())
    );
}

#[test]
fn test_release_swallows_store_errors() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    h.store.set_available(false);
    lease.release(&mut conn);
    assert!(lease.is_released());
    h.store.set_available(true);
}

#[test]
fn test_put_and_release_reports_store_failure_without_releasing() {
    let h = Harness::new();
    let mut conn = h.conn();
    let mut lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();

    h.store.set_available(false);
    let released = lease.put_and_release(&mut conn, &Report { rows: 1 }, None).unwrap();
    assert!(!released);
    assert!(!lease.is_released());

    h.store.set_available(true);
    lease.release(&mut conn);
    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);
}

#[test]
fn test_operations_on_unacquired_lease_are_invalid() {
    let h = Harness::new();
    let mut holder = h.conn();
    let mut conn = h.conn();
    let locker = h.locker();
    let _held = locker.acquire(&mut holder, "reports", LEASE, NO_WAIT).unwrap();

    let mut lease = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    assert!(!lease.is_acquired());
    assert!(matches!(
        lease.get_value::<Report, _>(&mut conn).unwrap_err(),
        KeeperError::InvalidOperation(_)
    ));
    assert!(matches!(
        lease.delete_and_release(&mut conn).unwrap_err(),
        KeeperError::InvalidOperation(_)
    ));

    // Releasing an unacquired lease is a harmless no-op.
    lease.release(&mut conn);
    assert!(holder.get("dlmlock:reports").unwrap().is_some());
}

#[test]
fn test_acquire_treats_store_outage_as_failed_attempts() {
    let h = Harness::new();
    let mut conn = h.conn();

    h.store.set_available(false);
    let lease = h
        .locker()
        .acquire(&mut conn, "reports", LEASE, Duration::from_millis(20))
        .unwrap();
    assert!(!lease.is_acquired());
}

#[test]
fn test_unparsable_lock_is_contention_not_takeover() {
    let h = Harness::new();
    let mut conn = h.conn();
    conn.set("dlmlock:reports", "garbage", None).unwrap();

    let lease = h.locker().acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    assert!(!lease.is_acquired());
    assert_eq!(conn.get("dlmlock:reports").unwrap().as_deref(), Some("garbage"));
}

/// What another client does just before our GETSET lands.
enum Interleave {
    /// Takes the expired lock over with this token.
    Takeover(String),
    /// The expired holder finally releases.
    Release,
}

struct RacingConnection {
    inner: MemoryConnection,
    interleave: Option<Interleave>,
}

impl Connection for RacingConnection {
    fn get(&mut self, key: &str) -> crate::error::Result<Option<String>> {
        self.inner.get(key)
    }
    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> crate::error::Result<()> {
        self.inner.set(key, value, ttl)
    }
    fn set_if_absent(&mut self, key: &str, value: &str) -> crate::error::Result<bool> {
        self.inner.set_if_absent(key, value)
    }
    fn get_and_set(&mut self, key: &str, value: &str) -> crate::error::Result<Option<String>> {
        match self.interleave.take() {
            Some(Interleave::Takeover(racer)) => {
                self.inner.get_and_set(key, &racer)?;
            }
            Some(Interleave::Release) => {
                self.inner.remove(key)?;
            }
            None => {}
        }
        self.inner.get_and_set(key, value)
    }
    fn remove(&mut self, key: &str) -> crate::error::Result<bool> {
        self.inner.remove(key)
    }
    fn watch(&mut self, key: &str) -> crate::error::Result<()> {
        self.inner.watch(key)
    }
    fn unwatch(&mut self) -> crate::error::Result<()> {
        self.inner.unwatch()
    }
    fn transaction(&mut self, commands: &[crate::store::Command]) -> crate::error::Result<bool> {
        self.inner.transaction(commands)
    }
    fn exec_script(
        &mut self,
        script: Script,
        keys: &[String],
        args: &[String],
    ) -> crate::error::Result<i64> {
        self.inner.exec_script(script, keys, args)
    }
    fn all_members_of_set(&mut self, set_key: &str) -> crate::error::Result<HashSet<String>> {
        self.inner.all_members_of_set(set_key)
    }
    fn union_of_sets(&mut self, set_keys: &[String]) -> crate::error::Result<HashSet<String>> {
        self.inner.union_of_sets(set_keys)
    }
    fn intersection_of_sets(&mut self, set_keys: &[String]) -> crate::error::Result<HashSet<String>> {
        self.inner.intersection_of_sets(set_keys)
    }
}

#[test]
fn test_losing_a_takeover_race_restores_the_winner() {
    let h = Harness::new();
    let locker = h.locker();
    let mut conn = h.conn();
    let abandoned = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    std::mem::forget(abandoned);
    h.clock.advance(LEASE + Duration::from_secs(1));

    let winner_token = FencingToken::for_lease(h.clock.now(), LEASE).value() + 7;
    let mut racing = RacingConnection {
        inner: h.conn(),
        interleave: Some(Interleave::Takeover(winner_token.to_string())),
    };

    let lost = locker.acquire(&mut racing, "reports", LEASE, NO_WAIT).unwrap();
    assert!(!lost.is_acquired());
    assert_eq!(
        conn.get("dlmlock:reports").unwrap(),
        Some(winner_token.to_string())
    );
}

#[test]
fn test_takeover_onto_a_vanished_lock_acquires() {
    let h = Harness::new();
    let locker = h.locker();
    let mut conn = h.conn();
    let abandoned = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    std::mem::forget(abandoned);
    h.clock.advance(LEASE + Duration::from_secs(1));

    let mut racing = RacingConnection {
        inner: h.conn(),
        interleave: Some(Interleave::Release),
    };
    let mut lease = locker.acquire(&mut racing, "reports", LEASE, NO_WAIT).unwrap();
    assert!(lease.is_acquired());
    assert_eq!(
        conn.get("dlmlock:reports").unwrap(),
        Some(lease.fencing_token().to_string())
    );

    // Releasing frees the key for the next caller.
    lease.release(&mut conn);
    let next = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    assert!(next.is_acquired());
}

#[test]
fn test_guard_releases_on_drop() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker();

    {
        let mut guard = locker.lock(&mut conn, "reports", LEASE, NO_WAIT).unwrap().unwrap();
        guard.put_value(&Report { rows: 2 }, None).unwrap();
        assert!(guard.connection().get("dlmlock:reports").unwrap().is_some());
    }

    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);
    assert_eq!(conn.get("reports").unwrap().as_deref(), Some(r#"{"rows":2}"#));
}

#[test]
fn test_guard_put_and_release() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker();

    let guard = locker.lock(&mut conn, "reports", LEASE, NO_WAIT).unwrap().unwrap();
    assert!(guard.put_and_release(&Report { rows: 4 }, None).unwrap());

    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);
    assert_eq!(conn.get("reports").unwrap().as_deref(), Some(r#"{"rows":4}"#));
}

#[test]
fn test_lock_or_fail_reports_not_acquired() {
    let h = Harness::new();
    let mut holder = h.conn();
    let mut conn = h.conn();
    let locker = h.locker();
    let _guard = locker.lock(&mut holder, "reports", LEASE, NO_WAIT).unwrap().unwrap();

    let err = locker
        .lock_or_fail(&mut conn, "reports", LEASE, NO_WAIT)
        .unwrap_err();
    assert!(matches!(
        err,
        KeeperError::LockNotAcquired { ref key, timeout_ms: 0 } if key == "reports"
    ));
}

#[test]
fn test_custom_prefix_namespaces_lock_keys() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker().with_prefix("locks/");

    let lease = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    assert_eq!(lease.lock_key(), "locks/reports");
    assert!(conn.get("locks/reports").unwrap().is_some());
}

#[test]
fn test_inspect_and_clear() {
    let h = Harness::new();
    let mut conn = h.conn();
    let locker = h.locker();

    assert!(locker.inspect(&mut conn, "reports").unwrap().is_none());

    let lease = locker.acquire(&mut conn, "reports", LEASE, NO_WAIT).unwrap();
    let status = locker.inspect(&mut conn, "reports").unwrap().unwrap();
    assert!(status.is_live());
    assert_eq!(status.token, Some(lease.fencing_token()));
    assert!(status.to_string().contains("live until"));

    h.clock.advance(LEASE + Duration::from_secs(1));
    let status = locker.inspect(&mut conn, "reports").unwrap().unwrap();
    assert!(matches!(status.state, LockState::Expired { .. }));
    assert!(status.to_string().contains("EXPIRED"));

    let cleared = locker.clear(&mut conn, "reports").unwrap().unwrap();
    assert_eq!(cleared.lock_key, "dlmlock:reports");
    assert_eq!(conn.get("dlmlock:reports").unwrap(), None);
    assert!(locker.clear(&mut conn, "reports").unwrap().is_none());

    conn.set("dlmlock:bad", "xyz", None).unwrap();
    let status = locker.inspect(&mut conn, "bad").unwrap().unwrap();
    assert_eq!(status.state, LockState::Corrupted);
}

fn race(workers: usize) -> usize {
    let store = MemoryStore::new();
    let locker = Locker::new(Arc::new(SystemClock));
    let key = format!("race-{}", workers);
    let counter = AtomicUsize::new(0);
    let barrier = Barrier::new(workers);

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                let mut conn = store.connect().unwrap();
                barrier.wait();
                // Lease valid for 2s, acquisition must succeed on the first try.
                if let Some(guard) = locker
                    .lock(&mut conn, &key, Duration::from_secs(2), NO_WAIT)
                    .unwrap()
                {
                    std::thread::sleep(Duration::from_millis(300));
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(guard);
                }
            });
        }
    });

    counter.load(Ordering::SeqCst)
}

#[test]
fn test_exactly_one_of_two_racers_acquires() {
    assert_eq!(race(2), 1);
}

#[test]
fn test_exactly_one_of_ten_racers_acquires() {
    assert_eq!(race(10), 1);
}

#[test]
fn test_exactly_one_of_fifty_racers_acquires() {
    assert_eq!(race(50), 1);
}

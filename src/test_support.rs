//! Shared fixtures for unit tests.

use crate::clock::ManualClock;
use crate::lease::Locker;
use crate::store::{MemoryConnection, MemoryStore, Store};
use std::sync::Arc;

/// A fixed, recognisable starting instant (2023-11-14T22:13:20Z).
pub(crate) const EPOCH_MS: i64 = 1_700_000_000_000;

/// A memory store and a manual clock that drives both TTLs and tokens.
pub(crate) struct Harness {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) store: MemoryStore,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let clock = Arc::new(ManualClock::at_millis(EPOCH_MS));
        let store = MemoryStore::with_clock(clock.clone());
        Self { clock, store }
    }

    pub(crate) fn conn(&self) -> MemoryConnection {
        self.store.connect().unwrap()
    }

    pub(crate) fn locker(&self) -> Locker {
        Locker::new(self.clock.clone())
    }
}

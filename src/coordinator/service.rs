//! The coordinator handle and its configuration.

use super::cache::LocalCache;
use crate::clock::Clock;
use crate::config::Config;
use crate::lease::Locker;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;

/// Acquisition budget for gated invocations.
pub const DEFAULT_GATE_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(2);

/// Acquisition budget for exclusive invocations.
pub const DEFAULT_MUTEX_ACQUISITION_TIMEOUT: Duration = Duration::from_millis(100);

/// Runs guarded operations under leases over a shared store.
///
/// Cheap to clone: clones share the store handle and the local cache.
#[derive(Debug, Clone)]
pub struct Coordinator<S: Store> {
    pub(super) store: S,
    pub(super) locker: Locker,
    pub(super) cache: Arc<LocalCache>,
    pub(super) gate_timeout: Duration,
    pub(super) mutex_timeout: Duration,
}

impl<S: Store> Coordinator<S> {
    /// A coordinator with its own local cache.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locker: Locker::new(clock.clone()),
            cache: Arc::new(LocalCache::new(clock)),
            gate_timeout: DEFAULT_GATE_ACQUISITION_TIMEOUT,
            mutex_timeout: DEFAULT_MUTEX_ACQUISITION_TIMEOUT,
        }
    }

    pub fn from_config(store: S, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locker: Locker::from_config(config, clock.clone()),
            cache: Arc::new(LocalCache::new(clock)),
            gate_timeout: config.gate_acquisition_timeout(),
            mutex_timeout: config.mutex_acquisition_timeout(),
        }
    }

    /// Share a process-wide cache instead of a private one.
    pub fn with_cache(mut self, cache: Arc<LocalCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_locker(mut self, locker: Locker) -> Self {
        self.locker = locker;
        self
    }

    pub fn with_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    pub fn with_mutex_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.mutex_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locker(&self) -> &Locker {
        &self.locker
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.locker.clock()
    }
}

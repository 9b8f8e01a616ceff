//! A granted right to run a guarded operation.

use super::cache::LocalCache;
use crate::lease::Lease;
use crate::store::Connection;
use std::sync::Arc;

/// Owns the connection and lease for one admitted invocation.
///
/// Dropping it releases the lease (a no-op if already released through the
/// tracker write) and clears any in-flight mark, including while unwinding
/// from a panicking operation.
pub(super) struct Admission<C: Connection> {
    pub(super) conn: C,
    pub(super) lease: Lease,
    mark: Option<(Arc<LocalCache>, String)>,
}

impl<C: Connection> Admission<C> {
    pub(super) fn new(conn: C, lease: Lease) -> Self {
        Self {
            conn,
            lease,
            mark: None,
        }
    }

    /// Clear `key` from `cache` when this admission ends.
    pub(super) fn with_mark(mut self, cache: Arc<LocalCache>, key: &str) -> Self {
        self.mark = Some((cache, key.to_string()));
        self
    }
}

impl<C: Connection> Drop for Admission<C> {
    fn drop(&mut self) {
        self.lease.release(&mut self.conn);
        if let Some((cache, key)) = self.mark.take() {
            cache.forget(&key);
        }
    }
}

/// An [`Admission`] held across an `.await`.
///
/// If the owning future is dropped before the admission is taken back, the
/// release runs on tokio's blocking pool instead of the async worker. No run
/// is recorded in that case.
pub(super) struct Detached<C: Connection + 'static>(Option<Admission<C>>);

impl<C: Connection + 'static> Detached<C> {
    pub(super) fn new(admission: Admission<C>) -> Self {
        Self(Some(admission))
    }

    pub(super) fn take(&mut self) -> Option<Admission<C>> {
        self.0.take()
    }
}

impl<C: Connection + 'static> Drop for Detached<C> {
    fn drop(&mut self) {
        let Some(admission) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || drop(admission));
            }
            Err(_) => drop(admission),
        }
    }
}

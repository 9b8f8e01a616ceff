//! RAII lease guard implementation.

use super::lock::Lease;
use crate::error::Result;
use crate::store::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// RAII guard for an acquired lease.
///
/// Borrows the connection the lease was acquired on. When dropped, the lease
/// is released; release errors are logged, never raised.
pub struct LeaseGuard<'c, C: Connection + ?Sized> {
    conn: &'c mut C,
    lease: Lease,
}

impl<'c, C: Connection + ?Sized> LeaseGuard<'c, C> {
    pub(super) fn new(conn: &'c mut C, lease: Lease) -> Self {
        Self { conn, lease }
    }

    pub fn lease(&self) -> &Lease {
        &self.lease
    }

    /// The underlying connection, for work done while holding the lease.
    pub fn connection(&mut self) -> &mut C {
        &mut *self.conn
    }

    pub fn assert_valid(&mut self, require_watch: bool) -> Result<()> {
        self.lease.assert_valid(&mut *self.conn, require_watch)
    }

    pub fn get_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.lease.get_value(&mut *self.conn)
    }

    pub fn put_value<T: Serialize>(&mut self, value: &T, ttl: Option<Duration>) -> Result<bool> {
        self.lease.put_value(&mut *self.conn, value, ttl)
    }

    /// Write the value and release. If this does not release (lock changed,
    /// store error), the guard still attempts a plain release on drop.
    pub fn put_and_release<T: Serialize>(mut self, value: &T, ttl: Option<Duration>) -> Result<bool> {
        self.lease.put_and_release(&mut *self.conn, value, ttl)
    }

    pub fn delete_and_release(mut self) -> Result<bool> {
        self.lease.delete_and_release(&mut *self.conn)
    }

    /// Release now instead of at the end of scope.
    pub fn release(mut self) {
        self.lease.release(&mut *self.conn);
    }
}

impl<C: Connection + ?Sized> Drop for LeaseGuard<'_, C> {
    fn drop(&mut self) {
        self.lease.release(&mut *self.conn);
    }
}

impl<C: Connection + ?Sized> std::fmt::Debug for LeaseGuard<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

//! Lease locks over the shared store.
//!
//! A lease grants mutual exclusion on a logical key for a bounded duration.
//!
//! # Lock Entries
//!
//! The lock for key `K` lives at `{prefix}K` (default prefix `dlmlock:`) and
//! holds only the lease's fencing token: the unix-millisecond instant at
//! which the lease expires, plus one. There is no store-side TTL; expiry is
//! decided by comparing the token with the current time, so a crashed holder's
//! lock is taken over by the next caller that finds it expired.
//!
//! # Acquisition
//!
//! `SETNX` first. If the lock exists and has expired, the caller swaps in its
//! own token with `GETSET` and keeps the lease only if the value it displaced
//! is the one it just read. Attempts back off with randomized quadratic
//! sleeps until the acquisition budget runs out, which yields an unacquired
//! [`Lease`] rather than an error.
//!
//! # Validity
//!
//! Every mutation through a lease first re-reads the lock entry. A missing
//! entry, an unparsable or older token, or a newer token each invalidate the
//! lease permanently (see [`Lease::assert_valid`]).
//!
//! # RAII Guards
//!
//! [`LeaseGuard`] releases its lease when dropped. Release never fails: store
//! errors are logged and swallowed, and a lock that no longer carries our
//! token is left alone.

mod backoff;
mod guard;
mod inspect;
mod lock;
mod locker;
mod token;

#[cfg(test)]
mod tests;

pub use backoff::Backoff;
pub use guard::LeaseGuard;
pub use inspect::{LockState, LockStatus};
pub use lock::Lease;
pub use locker::{DEFAULT_ACQUISITION_TIMEOUT, DEFAULT_LEASE_DURATION, DEFAULT_LOCK_PREFIX, Locker};
pub use token::FencingToken;

//! Leasekeeper: lease locks, tag indexing and rate-gated single-flight
//! execution over a shared key-value store.
//!
//! - [`lease`]: fencing-token leases with safe takeover of abandoned locks.
//! - [`tags`]: tagged writes and any/all tag lookups.
//! - [`coordinator`]: run an operation at most once at a time across a fleet,
//!   optionally no more often than a frequency window.
//! - [`store`]: the store capability surface, with in-memory and Redis backends.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod exit_codes;
pub mod lease;
pub mod logging;
pub mod store;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use coordinator::{Coordinator, GatePolicy, LocalCache, OperationKey, Outcome, Refusal};
pub use error::{KeeperError, Result};
pub use lease::{Lease, LeaseGuard, Locker};
pub use store::{Connection, MemoryStore, RedisStore, Store};
pub use tags::TagIndex;

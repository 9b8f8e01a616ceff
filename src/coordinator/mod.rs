//! Rate-gated single-flight coordination of guarded operations.
//!
//! A guarded operation is a closure plus an [`OperationKey`] naming it. The
//! [`Coordinator`] decides per invocation whether the closure may run:
//!
//! - **Gated** ([`Coordinator::execute`], [`Coordinator::run`] and their
//!   async forms): at most one run in flight per key across every process
//!   sharing the store, and no two runs starting closer together than the
//!   [`GatePolicy`]'s frequency window. The last run is recorded in a
//!   [`TrackerRecord`] stored under the lease.
//! - **Exclusive** ([`Coordinator::execute_exclusive`] and friends): at most
//!   one run in flight per key, with no rate limit.
//!
//! Refusing is the normal answer under contention, not an error. Store and
//! lease faults are logged and also reported as refusals, so nothing raised
//! inside the coordinator reaches the caller.
//!
//! # Lease duration
//!
//! The lease must outlast the operation's worst-case runtime. An operation
//! that overruns its lease can be started again elsewhere while still running.
//!
//! # Local cache
//!
//! A [`LocalCache`] shared by the coordinators of one process remembers
//! recent runs and in-flight exclusive runs, so obviously premature calls are
//! refused without a store round trip. Share one instance with
//! [`Coordinator::with_cache`].

mod admission;
mod cache;
mod exclusive;
mod gated;
mod key;
mod outcome;
mod service;
mod tracker;


pub use cache::LocalCache;
pub use key::{FREQUENCY_PREFIX, MUTEX_PREFIX, OperationKey};
pub use outcome::{GatePolicy, Outcome, Refusal};
pub use service::{Coordinator, DEFAULT_GATE_ACQUISITION_TIMEOUT, DEFAULT_MUTEX_ACQUISITION_TIMEOUT};
pub use tracker::{TrackerRecord, local_owner};

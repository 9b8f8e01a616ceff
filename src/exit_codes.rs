//! Exit code constants for the leasekeeper CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, lease misuse)
//! - 2: Store failure (unreachable store, rejected command)
//! - 3: Lock failure (not acquired, or lease invalidated)
//! - 4: The guarded operation ran and reported failure

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or misuse of a lease.
pub const USER_ERROR: i32 = 1;

/// Store failure: the shared store is unreachable or rejected a command.
pub const STORE_FAILURE: i32 = 2;

/// Lock failure: a lease could not be acquired or was found invalid.
pub const LOCK_FAILURE: i32 = 3;

/// The guarded operation ran but did not succeed.
pub const OPERATION_FAILURE: i32 = 4;

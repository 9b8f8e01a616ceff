//! Error types for leasekeeper.
//!
//! Uses thiserror for derive macros. Lease-lifecycle faults carry the lock they
//! were detected on so callers can log something actionable.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for leasekeeper operations.
///
/// A lease that simply could not be acquired in time is NOT an error for the
/// core API (see [`crate::lease::Locker::acquire`]); `LockNotAcquired` only
/// exists for helpers that explicitly ask for that outcome as an error.
#[derive(Error, Debug)]
pub enum KeeperError {
    /// The shared store could not be reached (network failure, timeout).
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected a command (wrong type, script error, ...).
    #[error("store command failed: {0}")]
    StoreCommand(String),

    /// A lease could not be acquired within the acquisition budget.
    #[error("lock '{key}' was not acquired within {timeout_ms}ms")]
    LockNotAcquired { key: String, timeout_ms: u64 },

    /// The lock entry vanished from the store through unsupported means.
    #[error("{lock} - the lock seems to have been removed from the store through unsupported means")]
    LockNotFound { lock: String },

    /// The stored lock value is malformed or older than the held token.
    #[error("{lock} - the lock was found but is in an inconsistent state (value: {found}, expected: {expected})")]
    LockCorrupted {
        lock: String,
        found: String,
        expected: String,
    },

    /// Another holder superseded this lease after it expired.
    #[error("{lock} - the lock expired and is now held by a lease {newer_by_ms}ms newer")]
    LockExpired { lock: String, newer_by_ms: i64 },

    /// Misuse of a lease (released, or never acquired).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Configuration could not be read or is invalid.
    #[error("{0}")]
    Config(String),

    /// A coordinated invocation was refused (contention or rate limit).
    #[error("not run: {0}")]
    Refused(String),

    /// A guarded operation ran and reported failure.
    #[error("operation failed: {0}")]
    OperationFailed(String),
}

impl KeeperError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            KeeperError::StoreUnavailable(_) => exit_codes::STORE_FAILURE,
            KeeperError::StoreCommand(_) => exit_codes::STORE_FAILURE,
            KeeperError::LockNotAcquired { .. } => exit_codes::LOCK_FAILURE,
            KeeperError::LockNotFound { .. } => exit_codes::LOCK_FAILURE,
            KeeperError::LockCorrupted { .. } => exit_codes::LOCK_FAILURE,
            KeeperError::LockExpired { .. } => exit_codes::LOCK_FAILURE,
            KeeperError::InvalidOperation(_) => exit_codes::USER_ERROR,
            KeeperError::Serialization(_) => exit_codes::USER_ERROR,
            KeeperError::Config(_) => exit_codes::USER_ERROR,
            KeeperError::Refused(_) => exit_codes::LOCK_FAILURE,
            KeeperError::OperationFailed(_) => exit_codes::OPERATION_FAILURE,
        }
    }

    /// True for the permanent faults raised when a held lease turns out to be invalid.
    pub fn is_lock_fault(&self) -> bool {
        matches!(
            self,
            KeeperError::LockNotFound { .. }
                | KeeperError::LockCorrupted { .. }
                | KeeperError::LockExpired { .. }
        )
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::Serialization(err.to_string())
    }
}

/// Result type alias for leasekeeper operations.
pub type Result<T> = std::result::Result<T, KeeperError>;

//! Results of a coordinated invocation.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Lease and frequency settings for one gated invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    /// How long the lease lasts. Must exceed the operation's worst-case runtime.
    pub lease_duration: Duration,

    /// Minimum spacing between runs; zero disables frequency gating.
    pub frequency_window: Duration,
}

impl GatePolicy {
    pub fn new(lease_duration: Duration, frequency_window: Duration) -> Self {
        Self {
            lease_duration,
            frequency_window,
        }
    }

    /// Mutual exclusion only: every acquisition runs the operation.
    pub fn lease_only(lease_duration: Duration) -> Self {
        Self::new(lease_duration, Duration::ZERO)
    }

    pub fn is_gated(&self) -> bool {
        !self.frequency_window.is_zero()
    }
}

/// Why an invocation did not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// A run started too recently (seen locally or in the shared tracker).
    RecentlyExecuted { last_executed: DateTime<Utc> },

    /// Another caller holds the lease.
    LeaseUnavailable,

    /// This process already has the operation in flight.
    AlreadyRunning,

    /// The store or the lease failed before the operation could start.
    Fault(String),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::RecentlyExecuted { last_executed } => {
                write!(f, "last executed at {}", last_executed.to_rfc3339())
            }
            Refusal::LeaseUnavailable => f.write_str("lease held elsewhere"),
            Refusal::AlreadyRunning => f.write_str("already running in this process"),
            Refusal::Fault(e) => write!(f, "{}", e),
        }
    }
}

/// What happened to one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran and returned `result`.
    Completed { result: bool },

    /// The operation ran and failed.
    Failed { error: String },

    Refused(Refusal),
}

impl Outcome {
    /// True only when the operation ran and reported success.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed { result: true })
    }

    pub fn ran(&self) -> bool {
        !matches!(self, Outcome::Refused(_))
    }

    pub(super) fn from_result<E: fmt::Display>(result: Result<bool, E>) -> Self {
        match result {
            Ok(result) => Outcome::Completed { result },
            Err(e) => Outcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { result } => write!(f, "completed ({})", result),
            Outcome::Failed { error } => write!(f, "failed: {}", error),
            Outcome::Refused(reason) => write!(f, "refused: {}", reason),
        }
    }
}

//! Randomized quadratic backoff between acquisition attempts.

use rand::Rng;
use std::time::Duration;

/// Sleep policy between acquisition attempts.
///
/// After attempt `i` (1-based) the caller sleeps a uniformly random number of
/// units in `[i², (i+1)²]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    unit: Duration,
}

impl Backoff {
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Bounds, in units, of the sleep after `attempt`.
    pub fn bounds(attempt: u32) -> (u64, u64) {
        let i = u64::from(attempt);
        (i.saturating_mul(i), (i + 1).saturating_mul(i + 1))
    }

    /// A random delay for `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let (low, high) = Self::bounds(attempt);
        let units = rand::thread_rng().gen_range(low..=high);
        self.unit
            .checked_mul(u32::try_from(units).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

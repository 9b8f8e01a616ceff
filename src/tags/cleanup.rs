//! Probabilistic cleanup scheduling.

use rand::Rng;

/// Chance that a tag write or multi-tag read prunes stale members first.
pub const DEFAULT_CLEANUP_PROBABILITY: f64 = 0.05;

/// How often the tag index cleans up after itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupPolicy {
    probability: f64,
}

impl CleanupPolicy {
    /// A policy that cleans up on roughly `probability` of calls.
    ///
    /// Values outside `[0, 1]` (and NaN) are clamped into range.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability }
    }

    pub fn never() -> Self {
        Self::new(0.0)
    }

    pub fn always() -> Self {
        Self::new(1.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Roll the dice for this call.
    pub fn should_run(&self) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CLEANUP_PROBABILITY)
    }
}

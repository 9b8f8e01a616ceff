//! Time-derived fencing tokens.

use crate::clock::{from_unix_ms, to_chrono};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A fencing token: the unix-millisecond expiry of a lease, plus one.
///
/// Tokens are ordered by the time they were issued for, so a later lease
/// supersedes an earlier one. They are stored as plain integer strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FencingToken(i64);

impl FencingToken {
    /// Token for a lease requested at `now` that lasts `lease_duration`.
    pub fn for_lease(now: DateTime<Utc>, lease_duration: Duration) -> Self {
        let expires = now
            .checked_add_signed(to_chrono(lease_duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self(expires.timestamp_millis().saturating_add(1))
    }

    pub fn from_millis(value: i64) -> Self {
        Self(value)
    }

    /// Parse a stored token. Anything but a plain integer is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse::<i64>().ok().map(Self)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// The instant the lease represented by this token stops being live.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        from_unix_ms(self.0 - 1)
    }

    /// Whether a lease with this token is still live at `now_ms`.
    pub fn is_live_at(&self, now_ms: i64) -> bool {
        self.0 > now_ms
    }
}

impl std::fmt::Display for FencingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

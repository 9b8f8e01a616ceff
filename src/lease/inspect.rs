//! Read-only views of lock entries for operators.

use super::token::FencingToken;
use chrono::{DateTime, Utc};

/// What a lock entry's value says about the lease behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Held; nobody can take it over before `expires_at`.
    Live { expires_at: DateTime<Utc> },
    /// Abandoned; the next acquirer will take it over.
    Expired { expired_at: DateTime<Utc> },
    /// The stored value is not a fencing token.
    Corrupted,
}

/// Information about a lock entry.
#[derive(Debug, Clone)]
pub struct LockStatus {
    /// The logical key.
    pub key: String,

    /// The namespaced lock key.
    pub lock_key: String,

    /// The raw stored value.
    pub raw: String,

    /// The parsed token, if the value is well formed.
    pub token: Option<FencingToken>,

    pub state: LockState,
}

impl LockStatus {
    pub(super) fn evaluate(key: &str, lock_key: String, raw: String, now: DateTime<Utc>) -> Self {
        let token = FencingToken::parse(&raw);
        let state = match token.and_then(|t| t.expires_at().map(|at| (t, at))) {
            Some((t, at)) if t.is_live_at(now.timestamp_millis()) => LockState::Live { expires_at: at },
            Some((_, at)) => LockState::Expired { expired_at: at },
            None => LockState::Corrupted,
        };
        Self {
            key: key.to_string(),
            lock_key,
            raw,
            token,
            state,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, LockState::Live { .. })
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            LockState::Live { expires_at } => write!(
                f,
                "{} (token: {}, live until {})",
                self.key,
                self.raw,
                expires_at.to_rfc3339()
            ),
            LockState::Expired { expired_at } => write!(
                f,
                "{} (token: {}, EXPIRED at {})",
                self.key,
                self.raw,
                expired_at.to_rfc3339()
            ),
            LockState::Corrupted => write!(f, "{} (value: {:?}, CORRUPTED)", self.key, self.raw),
        }
    }
}

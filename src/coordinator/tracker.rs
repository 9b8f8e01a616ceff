//! Per-operation execution tracker stored under the lease.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When a guarded operation last started a run, and who ran it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub last_executed: DateTime<Utc>,

    /// `user@host` of the process that wrote the record.
    #[serde(default)]
    pub owner: String,
}

impl TrackerRecord {
    pub fn new(last_executed: DateTime<Utc>) -> Self {
        Self {
            last_executed,
            owner: local_owner(),
        }
    }
}

/// `user@host` for the current process.
pub fn local_owner() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}

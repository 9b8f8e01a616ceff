//! Configuration constants and default value functions.
//!
//! Lock and tag namespaces default to the constants their subsystems export,
//! so a default `Config` and a default `Locker`/`TagIndex` always agree.

use crate::lease::{DEFAULT_ACQUISITION_TIMEOUT, DEFAULT_LEASE_DURATION, DEFAULT_LOCK_PREFIX};
use crate::tags::{DEFAULT_CLEANUP_PROBABILITY, DEFAULT_TAG_PREFIX, DEFAULT_TAG_REGISTRY_KEY};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "LEASEKEEPER_CONFIG";

/// Environment variable overriding `store_url`.
pub const STORE_URL_ENV_VAR: &str = "LEASEKEEPER_STORE_URL";

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "leasekeeper.yaml";

pub fn default_store_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

pub fn default_lock_prefix() -> String {
    DEFAULT_LOCK_PREFIX.to_string()
}

pub fn default_tag_prefix() -> String {
    DEFAULT_TAG_PREFIX.to_string()
}

pub fn default_tag_registry_key() -> String {
    DEFAULT_TAG_REGISTRY_KEY.to_string()
}

pub fn default_tag_cleanup_probability() -> f64 {
    DEFAULT_CLEANUP_PROBABILITY
}

pub fn default_lease_secs() -> u64 {
    DEFAULT_LEASE_DURATION.as_secs()
}

pub fn default_acquisition_timeout_ms() -> u64 {
    DEFAULT_ACQUISITION_TIMEOUT.as_millis() as u64
}

/// Budget for the coordinator's single acquisition attempt window.
pub fn default_gate_acquisition_timeout_ms() -> u64 {
    2_000
}

/// Budget for exclusive mode; contention there means "someone is already on it".
pub fn default_mutex_acquisition_timeout_ms() -> u64 {
    100
}

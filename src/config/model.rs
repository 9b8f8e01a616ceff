//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for leasekeeper.
///
/// This struct represents the contents of `leasekeeper.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Store settings
    // =========================================================================
    /// Connection string of the shared store.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    // =========================================================================
    // Lease settings
    // =========================================================================
    /// Namespace prepended to every lock key.
    #[serde(default = "default_lock_prefix")]
    pub lock_prefix: String,

    /// Lease duration used when a caller does not supply one.
    #[serde(default = "default_lease_secs")]
    pub default_lease_secs: u64,

    /// Default acquisition budget for plain lease acquisition.
    #[serde(default = "default_acquisition_timeout_ms")]
    pub acquisition_timeout_ms: u64,

    /// Acquisition budget used by the rate-gated coordinator.
    #[serde(default = "default_gate_acquisition_timeout_ms")]
    pub gate_acquisition_timeout_ms: u64,

    /// Acquisition budget used by exclusive (mutex) mode.
    #[serde(default = "default_mutex_acquisition_timeout_ms")]
    pub mutex_acquisition_timeout_ms: u64,

    // =========================================================================
    // Tag index settings
    // =========================================================================
    /// Namespace prepended to every tag set key.
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    /// Set listing every tag set, walked by cleanup.
    #[serde(default = "default_tag_registry_key")]
    pub tag_registry_key: String,

    /// Chance, per tagged write or multi-tag read, of pruning stale members.
    #[serde(default = "default_tag_cleanup_probability")]
    pub tag_cleanup_probability: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            lock_prefix: default_lock_prefix(),
            default_lease_secs: default_lease_secs(),
            acquisition_timeout_ms: default_acquisition_timeout_ms(),
            gate_acquisition_timeout_ms: default_gate_acquisition_timeout_ms(),
            mutex_acquisition_timeout_ms: default_mutex_acquisition_timeout_ms(),
            tag_prefix: default_tag_prefix(),
            tag_registry_key: default_tag_registry_key(),
            tag_cleanup_probability: default_tag_cleanup_probability(),
        }
    }
}

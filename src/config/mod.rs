//! Configuration model for leasekeeper.
//!
//! This module defines the Config struct that represents `leasekeeper.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, environment overrides, and
//! validation of config values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use types::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, STORE_URL_ENV_VAR};

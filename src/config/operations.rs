//! Config loading, resolution, validation, and utility operations.

use super::model::Config;
use super::types::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, STORE_URL_ENV_VAR};
use crate::error::{KeeperError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(KeeperError::Config)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            KeeperError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| KeeperError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| KeeperError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Find and load the effective config.
    ///
    /// Sources, first match wins:
    /// 1. `explicit` (a `--config` flag)
    /// 2. the file named by `$LEASEKEEPER_CONFIG`
    /// 3. `./leasekeeper.yaml`, if it exists
    /// 4. built-in defaults
    ///
    /// `$LEASEKEEPER_STORE_URL`, when set and non-empty, then replaces `store_url`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => match std::env::var(CONFIG_ENV_VAR) {
                Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
                _ => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.is_file()),
            },
        };

        let mut config = match &source {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                Self::load(path)?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(STORE_URL_ENV_VAR) {
            if !url.is_empty() {
                debug!(var = STORE_URL_ENV_VAR, "store URL overridden from environment");
                config.store_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `store_url` must be non-empty
    /// - `lock_prefix`, `tag_prefix` and `tag_registry_key` must be non-empty
    ///   and must not collide with each other
    /// - `default_lease_secs` must be positive
    /// - `tag_cleanup_probability` must be within `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if self.store_url.trim().is_empty() {
            return Err(KeeperError::Config(
                "config validation failed: store_url must not be empty".to_string(),
            ));
        }

        let namespaces = [
            ("lock_prefix", &self.lock_prefix),
            ("tag_prefix", &self.tag_prefix),
            ("tag_registry_key", &self.tag_registry_key),
        ];
        for (name, value) in &namespaces {
            if value.is_empty() {
                return Err(KeeperError::Config(format!(
                    "config validation failed: {} must not be empty",
                    name
                )));
            }
        }
        for (i, (a_name, a)) in namespaces.iter().enumerate() {
            for (b_name, b) in &namespaces[i + 1..] {
                if a.starts_with(b.as_str()) || b.starts_with(a.as_str()) {
                    return Err(KeeperError::Config(format!(
                        "config validation failed: {} ('{}') and {} ('{}') overlap",
                        a_name, a, b_name, b
                    )));
                }
            }
        }

        if self.default_lease_secs == 0 {
            return Err(KeeperError::Config(
                "config validation failed: default_lease_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.tag_cleanup_probability) {
            return Err(KeeperError::Config(format!(
                "config validation failed: tag_cleanup_probability must be between 0 and 1 (found {})",
                self.tag_cleanup_probability
            )));
        }

        Ok(())
    }

    pub fn default_lease(&self) -> Duration {
        Duration::from_secs(self.default_lease_secs)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }

    pub fn gate_acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_acquisition_timeout_ms)
    }

    pub fn mutex_acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.mutex_acquisition_timeout_ms)
    }
}

//! Tests for config functionality.

use crate::config::{CONFIG_ENV_VAR, Config, STORE_URL_ENV_VAR};
use crate::error::KeeperError;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn clear_env() {
    // SAFETY: every test touching these variables is #[serial].
    unsafe {
        std::env::remove_var(CONFIG_ENV_VAR);
        std::env::remove_var(STORE_URL_ENV_VAR);
    }
}

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.store_url, "redis://127.0.0.1:6379/");
    assert_eq!(config.lock_prefix, "dlmlock:");
    assert_eq!(config.tag_prefix, "tag:");
    assert_eq!(config.tag_registry_key, "tagindex:registry");
    assert_eq!(config.tag_cleanup_probability, 0.05);
    assert_eq!(config.default_lease(), Duration::from_secs(2 * 60 * 60));
    assert_eq!(config.acquisition_timeout(), Duration::from_secs(30));
    assert_eq!(config.gate_acquisition_timeout(), Duration::from_secs(2));
    assert_eq!(config.mutex_acquisition_timeout(), Duration::from_millis(100));
    config.validate().unwrap();
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
store_url: redis://cache.internal:6380/2
default_lease_secs: 600
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.store_url, "redis://cache.internal:6380/2");
    assert_eq!(config.default_lease(), Duration::from_secs(600));

    // Unspecified values should use defaults
    assert_eq!(config.lock_prefix, "dlmlock:");
    assert_eq!(config.gate_acquisition_timeout_ms, 2_000);
}

#[test]
fn test_parse_ignores_unknown_fields() {
    let yaml = r#"
lock_prefix: "locks:"
future_setting: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_prefix, "locks:");
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let err = Config::from_yaml("default_lease_secs: [not, a, number]").unwrap_err();
    assert!(matches!(err, KeeperError::Config(_)));
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_validation_rejects_zero_lease() {
    let err = Config::from_yaml("default_lease_secs: 0").unwrap_err();
    assert!(err.to_string().contains("default_lease_secs"));
}

#[test]
fn test_validation_rejects_probability_out_of_range() {
    let err = Config::from_yaml("tag_cleanup_probability: 1.5").unwrap_err();
    assert!(err.to_string().contains("tag_cleanup_probability"));

    Config::from_yaml("tag_cleanup_probability: 0").unwrap();
    Config::from_yaml("tag_cleanup_probability: 1").unwrap();
}

#[test]
fn test_validation_rejects_empty_or_overlapping_namespaces() {
    let err = Config::from_yaml("lock_prefix: ''").unwrap_err();
    assert!(err.to_string().contains("lock_prefix must not be empty"));

    let err = Config::from_yaml("tag_prefix: 'dlmlock:'").unwrap_err();
    assert!(err.to_string().contains("overlap"));

    let err = Config::from_yaml("tag_registry_key: 'tag:registry'").unwrap_err();
    assert!(err.to_string().contains("overlap"));
}

#[test]
fn test_validation_rejects_empty_store_url() {
    let err = Config::from_yaml("store_url: '  '").unwrap_err();
    assert!(err.to_string().contains("store_url"));
}

#[test]
fn test_to_yaml() {
    let config = Config {
        store_url: "redis://10.0.0.5/".to_string(),
        ..Default::default()
    };
    let yaml = config.to_yaml().unwrap();

    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_load_from_file() {
    let file = config_file("lock_prefix: 'jobs-lock:'\nmutex_acquisition_timeout_ms: 250\n");

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.lock_prefix, "jobs-lock:");
    assert_eq!(config.mutex_acquisition_timeout(), Duration::from_millis(250));
}

#[test]
fn test_config_load_missing_file() {
    let err = Config::load("/nonexistent/path/leasekeeper.yaml").unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
#[serial]
fn test_resolve_defaults_without_sources() {
    clear_env();
    let config = Config::resolve(None).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_resolve_prefers_explicit_path_over_env() {
    clear_env();
    let explicit = config_file("lock_prefix: 'explicit:'\n");
    let from_env = config_file("lock_prefix: 'env:'\n");
    unsafe { std::env::set_var(CONFIG_ENV_VAR, from_env.path()) };

    let config = Config::resolve(Some(explicit.path())).unwrap();
    assert_eq!(config.lock_prefix, "explicit:");

    let config = Config::resolve(None).unwrap();
    assert_eq!(config.lock_prefix, "env:");
    clear_env();
}

#[test]
#[serial]
fn test_resolve_store_url_override() {
    clear_env();
    let file = config_file("store_url: redis://from-file/\n");
    unsafe { std::env::set_var(STORE_URL_ENV_VAR, "redis://from-env/") };

    let config = Config::resolve(Some(file.path())).unwrap();
    assert_eq!(config.store_url, "redis://from-env/");

    unsafe { std::env::set_var(STORE_URL_ENV_VAR, "") };
    let config = Config::resolve(Some(file.path())).unwrap();
    assert_eq!(config.store_url, "redis://from-file/");
    clear_env();
}

#[test]
#[serial]
fn test_resolve_missing_env_file_is_an_error() {
    clear_env();
    unsafe { std::env::set_var(CONFIG_ENV_VAR, "/nonexistent/leasekeeper.yaml") };

    let err = Config::resolve(None).unwrap_err();
    assert!(matches!(err, KeeperError::Config(_)));
    clear_env();
}

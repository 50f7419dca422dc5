//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::path::PathBuf;

use siteauth_domain::{Config, SiteAuthError};
use siteauth_infra::config;
use tempfile::TempDir;

#[test]
fn test_load_config_from_json_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("siteauth.json");
    std::fs::write(
        &path,
        r#"{
            "session": {
                "refresh_threshold_secs": 900,
                "check_interval_secs": 240,
                "refresh_timeout_secs": 20,
                "rejection_cooldown_secs": 120
            },
            "storage": {
                "keychain_service": "SiteAuth.integration",
                "site_directory_path": "/tmp/siteauth-integration/sites.json"
            },
            "http": {
                "timeout_secs": 10,
                "redirect_uri": "siteauth-test://callback"
            }
        }"#,
    )
    .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Should load JSON config");

    assert!(config.validate().is_ok());
    assert_eq!(config.session.refresh_threshold_secs, 900);
    assert_eq!(config.session.check_interval_secs, 240);
    assert_eq!(config.session.refresh_timeout_secs, 20);
    assert_eq!(config.session.rejection_cooldown_secs, 120);
    assert_eq!(config.storage.keychain_service, "SiteAuth.integration");
    assert_eq!(
        config.storage.site_directory_path,
        PathBuf::from("/tmp/siteauth-integration/sites.json")
    );
    assert_eq!(config.http.timeout_secs, 10);
    assert_eq!(config.http.redirect_uri, "siteauth-test://callback");
}

#[test]
fn test_empty_toml_file_yields_defaults() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("siteauth.toml");
    std::fs::write(&path, "").expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Should load empty TOML config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_invalid_values_fail_validation_not_parsing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("siteauth.toml");
    std::fs::write(&path, "[session]\nrefresh_threshold_secs = 100\ncheck_interval_secs = 300\n")
        .expect("Failed to write config");

    let config = config::load_from_file(Some(path)).expect("Should parse config");

    assert!(matches!(config.validate(), Err(SiteAuthError::Config(_))));
}

#[test]
fn test_load_from_missing_file_is_config_error() {
    let result = config::load_from_file(Some(PathBuf::from("/nonexistent/siteauth.toml")));

    assert!(matches!(result, Err(SiteAuthError::Config(_))));
}

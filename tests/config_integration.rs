//! Integration tests for configuration parsing and handling.
//!
//! These tests verify that the configuration system correctly handles
//! various configuration scenarios.

use pretty_assertions::assert_eq;
use tidemark::migrate::Version;
use tidemark::{MigrationConfig, MigrationError};

/// Test minimal configuration
#[test]
fn test_config_minimal() {
    let config = MigrationConfig::from_toml("").expect("Failed to parse config");
    assert_eq!(config, MigrationConfig::default());
}

/// Test full configuration with all options
#[test]
fn test_config_full() {
    let config_str = r#"
        out_of_order = true
        target = "4.2"
        validate_on_migrate = false
        ignore_missing = true
        ignore_future = false
        baseline_on_migrate = true
        baseline_version = "82"
        baseline_description = "Imported from production"
        installed_by = "ci"
        lock_timeout_secs = 45
    "#;

    let config = MigrationConfig::from_toml(config_str).expect("Failed to parse config");

    assert!(config.out_of_order);
    assert_eq!(config.target, Some("4.2".parse::<Version>().unwrap()));
    assert!(!config.validate_on_migrate);
    assert!(config.ignore_missing);
    assert!(!config.ignore_future);
    assert!(config.baseline_on_migrate);
    assert_eq!(config.baseline_version, Version::from(82));
    assert_eq!(config.baseline_description, "Imported from production");
    assert_eq!(config.installed_by, "ci");
    assert_eq!(config.lock_timeout_secs, Some(45));
}

/// Versions written with underscores parse the same as dotted ones
#[test]
fn test_config_underscored_version() {
    let config = MigrationConfig::from_toml(r#"target = "2_1""#).unwrap();
    assert_eq!(config.target, Some("2.1".parse().unwrap()));
}

/// Test invalid configuration values
#[test]
fn test_config_invalid_values() {
    let err = MigrationConfig::from_toml(r#"lock_timeout_secs = "soon""#).unwrap_err();
    assert!(matches!(err, MigrationError::Config(_)));

    let err = MigrationConfig::from_toml(r#"baseline_version = """#).unwrap_err();
    assert!(matches!(err, MigrationError::Config(_)));
}

/// Test configuration saved to disk is read back unchanged
#[tokio::test]
async fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tidemark.toml");

    let config = MigrationConfig::new()
        .out_of_order(true)
        .baseline_version("1.5".parse().unwrap())
        .installed_by("deployer");
    config.save(&path).await.unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("installed_by = \"deployer\""));

    let loaded = MigrationConfig::load(&path).await.unwrap();
    assert_eq!(loaded, config);
}

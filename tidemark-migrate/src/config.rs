//! Engine configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::version::Version;

/// Default description of baseline rows.
pub const DEFAULT_BASELINE_DESCRIPTION: &str = "<< Baseline >>";

/// Default `installed_by` recorded in the ledger.
pub const DEFAULT_INSTALLED_BY: &str = "tidemark";

/// Configuration for the migration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Allow pending versions below the highest applied version to run.
    pub out_of_order: bool,
    /// Only run versioned migrations up to and including this version.
    pub target: Option<Version>,
    /// Validate the ledger against the catalog before migrating.
    pub validate_on_migrate: bool,
    /// Do not fail validation on applied migrations that are no longer resolved.
    pub ignore_missing: bool,
    /// Do not fail validation on applied versions above the catalog.
    pub ignore_future: bool,
    /// Baseline an empty ledger before migrating.
    pub baseline_on_migrate: bool,
    /// Version used by baseline-on-migrate.
    pub baseline_version: Version,
    /// Description recorded on baseline rows.
    pub baseline_description: String,
    /// Value recorded as `installed_by`.
    pub installed_by: String,
    /// Give up waiting for the ledger lock after this many seconds.
    pub lock_timeout_secs: Option<u64>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            out_of_order: false,
            target: None,
            validate_on_migrate: true,
            ignore_missing: false,
            ignore_future: true,
            baseline_on_migrate: false,
            baseline_version: Version::from(1),
            baseline_description: DEFAULT_BASELINE_DESCRIPTION.to_string(),
            installed_by: DEFAULT_INSTALLED_BY.to_string(),
            lock_timeout_secs: None,
        }
    }
}

impl MigrationConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow out-of-order migrations.
    pub fn out_of_order(mut self, allow: bool) -> Self {
        self.out_of_order = allow;
        self
    }

    /// Set the target version.
    pub fn target(mut self, target: Version) -> Self {
        self.target = Some(target);
        self
    }

    /// Set whether to validate before migrating.
    pub fn validate_on_migrate(mut self, validate: bool) -> Self {
        self.validate_on_migrate = validate;
        self
    }

    /// Set whether missing migrations fail validation.
    pub fn ignore_missing(mut self, ignore: bool) -> Self {
        self.ignore_missing = ignore;
        self
    }

    /// Set whether future migrations fail validation.
    pub fn ignore_future(mut self, ignore: bool) -> Self {
        self.ignore_future = ignore;
        self
    }

    /// Enable baselining an empty ledger on migrate.
    pub fn baseline_on_migrate(mut self, enable: bool) -> Self {
        self.baseline_on_migrate = enable;
        self
    }

    /// Set the baseline version.
    pub fn baseline_version(mut self, version: Version) -> Self {
        self.baseline_version = version;
        self
    }

    /// Set the baseline description.
    pub fn baseline_description(mut self, description: impl Into<String>) -> Self {
        self.baseline_description = description.into();
        self
    }

    /// Set the `installed_by` value.
    pub fn installed_by(mut self, user: impl Into<String>) -> Self {
        self.installed_by = user.into();
        self
    }

    /// Set the lock timeout.
    pub fn lock_timeout_secs(mut self, secs: u64) -> Self {
        self.lock_timeout_secs = Some(secs);
        self
    }

    /// Load configuration from a TOML file; a missing file yields the defaults.
    pub async fn load(path: impl AsRef<Path>) -> MigrateResult<Self> {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            MigrationError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML.
    pub fn from_toml(content: &str) -> MigrateResult<Self> {
        toml::from_str(content)
            .map_err(|e| MigrationError::config(format!("Failed to parse configuration: {}", e)))
    }

    /// Save configuration to a TOML file.
    pub async fn save(&self, path: impl AsRef<Path>) -> MigrateResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MigrationError::config(format!("Failed to create directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            MigrationError::config(format!("Failed to serialize configuration: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            MigrationError::config(format!("Failed to write {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = MigrationConfig::default();
        assert!(!config.out_of_order);
        assert!(config.validate_on_migrate);
        assert!(config.ignore_future);
        assert!(!config.ignore_missing);
        assert_eq!(config.baseline_version, Version::from(1));
        assert_eq!(config.baseline_description, "<< Baseline >>");
    }

    #[test]
    fn test_config_builder() {
        let config = MigrationConfig::new()
            .out_of_order(true)
            .target("2.1".parse().unwrap())
            .validate_on_migrate(false)
            .ignore_missing(true)
            .baseline_on_migrate(true)
            .baseline_version("82".parse().unwrap())
            .installed_by("deployer")
            .lock_timeout_secs(30);

        assert!(config.out_of_order);
        assert_eq!(config.target, Some("2.1".parse().unwrap()));
        assert!(!config.validate_on_migrate);
        assert!(config.ignore_missing);
        assert!(config.baseline_on_migrate);
        assert_eq!(config.baseline_version.to_string(), "82");
        assert_eq!(config.installed_by, "deployer");
        assert_eq!(config.lock_timeout_secs, Some(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MigrationConfig::from_toml(
            r#"
            out_of_order = true
            baseline_version = "1.5"
            "#,
        )
        .unwrap();

        assert!(config.out_of_order);
        assert_eq!(config.baseline_version, "1.5".parse().unwrap());
        assert!(config.validate_on_migrate);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = MigrationConfig::from_toml(r#"target = "not.a.version""#).unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MigrationConfig::load(dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config, MigrationConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tidemark.toml");
        let config = MigrationConfig::new().target("3".parse().unwrap()).ignore_missing(true);

        config.save(&path).await.unwrap();
        let loaded = MigrationConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}

//! The set of migrations available for application.

use std::collections::HashMap;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::{MigrationIdentity, ResolvedMigration};
use crate::version::Version;

/// Supplies resolved migrations, e.g. by scanning a directory.
///
/// Implementations must return the same set for the duration of one operation.
#[async_trait::async_trait]
pub trait MigrationCatalog: Send + Sync {
    /// List the available migrations in discovery order.
    async fn resolve(&self) -> MigrateResult<Vec<ResolvedMigration>>;
}

#[async_trait::async_trait]
impl MigrationCatalog for Vec<ResolvedMigration> {
    async fn resolve(&self) -> MigrateResult<Vec<ResolvedMigration>> {
        Ok(self.clone())
    }
}

/// A validated snapshot of resolved migrations.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: Vec<ResolvedMigration>,
}

impl Catalog {
    /// Validate and wrap resolved migrations, keeping discovery order.
    pub fn new(migrations: Vec<ResolvedMigration>) -> MigrateResult<Self> {
        let mut seen: HashMap<MigrationIdentity, &ResolvedMigration> = HashMap::new();
        for migration in &migrations {
            if let Some(first) = seen.insert(migration.identity(), migration) {
                return Err(MigrationError::validation(format!(
                    "found more than one migration with identity {} ({} and {})",
                    first.identity(),
                    first.script,
                    migration.script
                )));
            }
        }
        Ok(Self { migrations })
    }

    /// Resolve from a provider and validate.
    pub async fn load<C: MigrationCatalog + ?Sized>(provider: &C) -> MigrateResult<Self> {
        Self::new(provider.resolve().await?)
    }

    /// All migrations in discovery order.
    pub fn migrations(&self) -> &[ResolvedMigration] {
        &self.migrations
    }

    /// Versioned migrations in discovery order.
    pub fn versioned(&self) -> impl Iterator<Item = &ResolvedMigration> {
        self.migrations.iter().filter(|m| m.is_versioned())
    }

    /// Repeatable migrations in discovery order.
    pub fn repeatable(&self) -> impl Iterator<Item = &ResolvedMigration> {
        self.migrations.iter().filter(|m| m.is_repeatable())
    }

    /// Highest version in the catalog.
    pub fn highest_version(&self) -> Option<&Version> {
        self.versioned().filter_map(|m| m.version.as_ref()).max()
    }

    /// Find a migration by identity.
    pub fn find(&self, identity: &MigrationIdentity) -> Option<&ResolvedMigration> {
        self.migrations.iter().find(|m| &m.identity() == identity)
    }

    /// Number of migrations.
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let result = Catalog::new(vec![
            ResolvedMigration::versioned_script(v("1"), "init", "SELECT 1;"),
            ResolvedMigration::versioned_script(v("1.0"), "init", "SELECT 2;"),
        ]);
        let err = result.unwrap_err();
        assert!(err.is_validation());
        let message = err.to_string();
        assert!(message.contains("identity 1 - init"));
        assert!(message.contains("V1__init.sql and V1.0__init.sql"));
    }

    #[test]
    fn test_duplicate_repeatable_rejected() {
        let result = Catalog::new(vec![
            ResolvedMigration::repeatable_script("views", "SELECT 1;"),
            ResolvedMigration::repeatable_script("views", "SELECT 2;"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_same_version_different_description_allowed() {
        let catalog = Catalog::new(vec![
            ResolvedMigration::versioned_script(v("2"), "a", "SELECT 1;"),
            ResolvedMigration::versioned_script(v("2"), "b", "SELECT 2;"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_highest_version() {
        let catalog = Catalog::new(vec![
            ResolvedMigration::versioned_script(v("1.10"), "b", "SELECT 1;"),
            ResolvedMigration::repeatable_script("views", "SELECT 2;"),
            ResolvedMigration::versioned_script(v("1.9"), "a", "SELECT 3;"),
        ])
        .unwrap();

        assert_eq!(catalog.highest_version(), Some(&v("1.10")));
        assert_eq!(catalog.versioned().count(), 2);
        assert_eq!(catalog.repeatable().count(), 1);
        assert!(Catalog::default().highest_version().is_none());
    }

    #[tokio::test]
    async fn test_load_from_provider() {
        let provider = vec![ResolvedMigration::versioned_script(v("1"), "init", "SELECT 1;")];
        let catalog = Catalog::load(&provider).await.unwrap();
        let identity = MigrationIdentity::Versioned(v("1"), "init".to_string());
        assert!(catalog.find(&identity).is_some());
    }
}

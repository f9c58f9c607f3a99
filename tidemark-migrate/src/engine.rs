//! Migration engine facade.
//!
//! Ties a ledger store, a catalog provider and an executor together under
//! one configuration. Every mutating operation runs under the ledger lock.

use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::{Catalog, MigrationCatalog};
use crate::commands::{baseline, liberate, migrate, read_ledger, repair, validate};
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::MigrationExecutor;
use crate::history::{ForeignLedgerReader, LedgerLock, LedgerStore};
use crate::info::MigrationInfoService;
use crate::migration::ResolvedMigration;
use crate::version::Version;

/// The main migration engine.
pub struct MigrationEngine<L, C, E>
where
    L: LedgerStore,
    C: MigrationCatalog,
    E: MigrationExecutor,
{
    config: MigrationConfig,
    ledger: L,
    catalog: C,
    executor: E,
}

impl<L, C, E> MigrationEngine<L, C, E>
where
    L: LedgerStore,
    C: MigrationCatalog,
    E: MigrationExecutor,
{
    /// Create a new migration engine.
    pub fn new(config: MigrationConfig, ledger: L, catalog: C, executor: E) -> Self {
        Self {
            config,
            ledger,
            catalog,
            executor,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get the ledger store.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Get the executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Create the ledger table if it does not exist.
    pub async fn initialize(&self) -> MigrateResult<()> {
        self.ledger.initialize().await?;
        debug!(table = self.ledger.table_name(), "Ledger initialized");
        Ok(())
    }

    async fn load_catalog(&self) -> MigrateResult<Catalog> {
        Catalog::load(&self.catalog).await
    }

    async fn lock(&self) -> MigrateResult<LedgerLock> {
        let Some(secs) = self.config.lock_timeout_secs else {
            return self.ledger.acquire_lock().await;
        };

        tokio::time::timeout(Duration::from_secs(secs), self.ledger.acquire_lock())
            .await
            .map_err(|_| {
                MigrationError::lock_failed(format!(
                    "Timed out after {}s waiting for the lock on {}",
                    secs,
                    self.ledger.table_name()
                ))
            })?
    }

    /// Reconcile the catalog against the ledger.
    pub async fn info(&self) -> MigrateResult<MigrationInfoService> {
        self.initialize().await?;
        let catalog = self.load_catalog().await?;
        let rows = read_ledger(&self.ledger).await?;
        Ok(MigrationInfoService::new(&catalog, &rows))
    }

    /// Validate the ledger against the catalog.
    pub async fn validate(&self) -> MigrateResult<validate::ValidateOutput> {
        self.initialize().await?;
        let catalog = self.load_catalog().await?;
        let rows = read_ledger(&self.ledger).await?;
        validate::execute(&catalog, &rows, &self.config).into_result()
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> MigrateResult<migrate::MigrateOutput> {
        self.initialize().await?;
        let catalog = self.load_catalog().await?;
        let _lock = self.lock().await?;
        migrate::execute(&self.ledger, &catalog, &self.executor, &self.config).await
    }

    /// Baseline an empty ledger at the configured version.
    pub async fn baseline(&self) -> MigrateResult<baseline::BaselineOutput> {
        let version = self.config.baseline_version.clone();
        let description = self.config.baseline_description.clone();
        self.baseline_with(&version, &description, None).await
    }

    /// Baseline an empty ledger, optionally running an initializer first.
    pub async fn baseline_with(
        &self,
        version: &Version,
        description: &str,
        initializer: Option<&ResolvedMigration>,
    ) -> MigrateResult<baseline::BaselineOutput> {
        self.initialize().await?;
        let _lock = self.lock().await?;
        baseline::execute(
            &self.ledger,
            &self.executor,
            baseline::BaselineRequest {
                version,
                description,
                initializer,
                installed_by: &self.config.installed_by,
            },
        )
        .await
    }

    /// Repair the ledger.
    pub async fn repair(&self) -> MigrateResult<repair::RepairOutput> {
        self.initialize().await?;
        let catalog = self.load_catalog().await?;
        let _lock = self.lock().await?;
        repair::execute(&self.ledger, &catalog).await
    }

    /// Import a foreign tool's ledger into the empty ledger.
    pub async fn liberate<F>(&self, foreign: &F) -> MigrateResult<liberate::LiberateOutput>
    where
        F: ForeignLedgerReader + ?Sized,
    {
        self.initialize().await?;
        let catalog = self.load_catalog().await?;
        let _lock = self.lock().await?;
        let output = liberate::execute(foreign, &catalog, &self.ledger).await?;
        info!(
            copied = output.copied(),
            "Liberate finished; run repair to align checksums with local migrations"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::executor::{BodyExecutor, SqlRunner};
    use crate::info::MigrationState;
    use crate::memory::MemoryLedger;

    #[derive(Clone, Default)]
    struct Recorder {
        statements: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl SqlRunner for Recorder {
        async fn execute_sql(&self, sql: &str) -> MigrateResult<()> {
            if sql.contains("FAIL") {
                return Err(MigrationError::database("syntax error"));
            }
            self.statements.lock().push(sql.to_string());
            Ok(())
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn engine(
        config: MigrationConfig,
        catalog: Vec<ResolvedMigration>,
    ) -> MigrationEngine<MemoryLedger, Vec<ResolvedMigration>, BodyExecutor<Recorder>> {
        MigrationEngine::new(
            config,
            MemoryLedger::default(),
            catalog,
            BodyExecutor::new(Recorder::default()),
        )
    }

    #[tokio::test]
    async fn test_migrate_then_info() {
        let engine = engine(
            MigrationConfig::default(),
            vec![
                ResolvedMigration::versioned_script(v("1"), "create users", "CREATE TABLE users;"),
                ResolvedMigration::versioned_script(v("2"), "create posts", "CREATE TABLE posts;"),
            ],
        );

        let output = engine.migrate().await.unwrap();
        assert_eq!(output.migrations_executed, 2);
        assert_eq!(
            engine.executor().runner().statements.lock().clone(),
            vec!["CREATE TABLE users;", "CREATE TABLE posts;"]
        );
        assert!(!engine.ledger().is_locked());

        let info = engine.info().await.unwrap();
        assert_eq!(info.in_state(MigrationState::Success).len(), 2);
        assert_eq!(info.current_version(), Some(&v("2")));
        assert!(engine.validate().await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let engine = engine(
            MigrationConfig::default(),
            vec![
                ResolvedMigration::versioned_script(v("1"), "init", "SELECT 1;"),
                ResolvedMigration::versioned_script(v("1.0"), "init", "SELECT 2;"),
            ],
        );

        let err = engine.migrate().await.unwrap_err();
        assert!(err.is_validation());
        assert!(engine.ledger().is_empty());
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let engine = engine(MigrationConfig::new().lock_timeout_secs(0), vec![]);
        let held = engine.ledger().acquire_lock().await.unwrap();

        let err = engine.repair().await.unwrap_err();
        assert!(matches!(err, MigrationError::LockFailed(_)));
        assert!(err.is_recoverable());

        drop(held);
        assert!(engine.repair().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_then_repair_then_migrate() {
        let good = ResolvedMigration::versioned_script(v("1"), "ok", "SELECT 1;");
        let broken = ResolvedMigration::versioned_script(v("2"), "broken", "FAIL");
        let engine = engine(MigrationConfig::default(), vec![good, broken]);

        let output = engine.migrate().await.unwrap();
        assert!(!output.success());
        assert!(engine.migrate().await.unwrap_err().is_validation());

        let repaired = engine.repair().await.unwrap();
        assert_eq!(repaired.migrations_removed.len(), 1);
        assert_eq!(engine.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_baseline_uses_config() {
        let engine = engine(MigrationConfig::new().baseline_version(v("82")), vec![]);

        let output = engine.baseline().await.unwrap();
        assert_eq!(output.baseline_version, Some(v("82")));
        assert_eq!(engine.ledger().rows()[0].description, "<< Baseline >>");
    }
}

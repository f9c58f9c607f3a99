//! Apply pending migrations.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::{baseline, read_ledger, validate};
use crate::catalog::Catalog;
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::MigrationExecutor;
use crate::history::LedgerStore;
use crate::info::{MigrationInfoService, highest_applied_version};
use crate::migration::{MigrationType, NewAppliedMigration, ResolvedMigration};
use crate::version::Version;

/// One unit run by migrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateOutputEntry {
    /// Version, `None` for repeatables.
    pub version: Option<Version>,
    /// Description of the unit.
    pub description: String,
    /// Kind of the unit.
    pub migration_type: MigrationType,
    /// Script location.
    pub script: String,
    /// Duration in milliseconds.
    pub execution_time_ms: i64,
    /// Whether the unit succeeded.
    pub success: bool,
}

/// Result of a migrate run.
#[derive(Debug)]
pub struct MigrateOutput {
    /// Highest applied version before the run.
    pub initial_schema_version: Option<Version>,
    /// Version of the last versioned unit applied, or the initial version.
    pub target_version: Option<Version>,
    /// Number of units that succeeded.
    pub migrations_executed: usize,
    /// Every unit attempted, in order.
    pub migrations: Vec<MigrateOutputEntry>,
    /// Whether the run started by baselining an empty ledger.
    pub baselined: bool,
    /// Total duration in milliseconds.
    pub total_time_ms: i64,
    /// Warnings generated during the run.
    pub warnings: Vec<String>,
    /// The failure that stopped the run.
    pub failure: Option<MigrationError>,
}

impl MigrateOutput {
    fn new(initial: Option<Version>) -> Self {
        Self {
            target_version: initial.clone(),
            initial_schema_version: initial,
            migrations_executed: 0,
            migrations: Vec::new(),
            baselined: false,
            total_time_ms: 0,
            warnings: Vec::new(),
            failure: None,
        }
    }

    /// Check if every attempted unit succeeded.
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Check if nothing was attempted.
    pub fn is_noop(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Surface the failure, if any, as an error.
    pub fn into_result(self) -> MigrateResult<Self> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let version = self
            .target_version
            .as_ref()
            .map_or_else(|| "<< Empty Schema >>".to_string(), ToString::to_string);

        match (&self.failure, self.migrations_executed) {
            (Some(failure), _) => format!(
                "{} applied before failure: {}",
                self.migrations_executed, failure
            ),
            (None, 0) => format!("Schema is up to date at version {}", version),
            (None, n) => format!(
                "{} applied in {}ms, now at version {}",
                n, self.total_time_ms, version
            ),
        }
    }
}

/// Apply every pending unit in order, stopping at the first failure.
///
/// Rejected runs (validation, consistency) return `Err` before anything is
/// written. A unit that fails is recorded as a failed row and reported
/// through [`MigrateOutput::failure`]; rows for earlier units stay.
pub async fn execute<L, E>(
    ledger: &L,
    catalog: &Catalog,
    executor: &E,
    config: &MigrationConfig,
) -> MigrateResult<MigrateOutput>
where
    L: LedgerStore + ?Sized,
    E: MigrationExecutor + ?Sized,
{
    let start = Instant::now();
    let mut rows = read_ledger(ledger).await?;
    let mut baselined = false;

    if rows.is_empty() && config.baseline_on_migrate {
        baseline::execute(
            ledger,
            executor,
            baseline::BaselineRequest {
                version: &config.baseline_version,
                description: &config.baseline_description,
                initializer: None,
                installed_by: &config.installed_by,
            },
        )
        .await?;
        baselined = true;
        rows = read_ledger(ledger).await?;
    }

    let mut output = MigrateOutput::new(highest_applied_version(&rows).cloned());
    output.baselined = baselined;

    let validation = validate::execute(catalog, &rows, config);
    let blocking: Vec<String> = validation
        .issues
        .iter()
        .filter(|issue| config.validate_on_migrate || issue.always_blocks_migrate())
        .map(ToString::to_string)
        .collect();
    if !blocking.is_empty() {
        return Err(MigrationError::validation(blocking.join("; ")));
    }

    let service = MigrationInfoService::new(catalog, &rows);
    for future in service.all().iter().filter(|i| i.is_future()) {
        let message = format!(
            "Schema has applied migration {} newer than any resolved migration",
            future.identity()
        );
        warn!("{}", message);
        output.warnings.push(message);
    }

    let mut plan: Vec<&ResolvedMigration> = Vec::new();
    for info in service.pending() {
        let Some(resolved) = info.resolved() else {
            continue;
        };
        if let (Some(version), Some(target)) = (&resolved.version, &config.target)
            && version > target
        {
            debug!(migration = %resolved.identity(), target = %target, "Above target, skipping");
            continue;
        }
        plan.push(resolved);
    }

    if plan.is_empty() {
        info!(table = ledger.table_name(), "Schema is up to date");
        output.total_time_ms = start.elapsed().as_millis() as i64;
        return Ok(output);
    }

    info!(
        table = ledger.table_name(),
        count = plan.len(),
        "Migrating schema"
    );

    for migration in plan {
        debug!(migration = %migration.identity(), "Applying migration");

        let unit_start = Instant::now();
        let outcome = executor.execute(migration).await;
        let elapsed = unit_start.elapsed().as_millis() as i64;

        ledger
            .append(NewAppliedMigration::executed(
                migration,
                config.installed_by.as_str(),
                elapsed,
                outcome.is_ok(),
            ))
            .await?;

        output.migrations.push(MigrateOutputEntry {
            version: migration.version.clone(),
            description: migration.description.clone(),
            migration_type: migration.migration_type,
            script: migration.script.clone(),
            execution_time_ms: elapsed,
            success: outcome.is_ok(),
        });

        match outcome {
            Ok(()) => {
                output.migrations_executed += 1;
                if let Some(version) = &migration.version {
                    output.target_version = Some(version.clone());
                }
            }
            Err(source) => {
                warn!(
                    migration = %migration.identity(),
                    error = %source,
                    "Migration failed"
                );
                output.failure = Some(MigrationError::migration_failed(
                    migration.version.clone(),
                    migration.description.clone(),
                    source,
                ));
                break;
            }
        }
    }

    output.total_time_ms = start.elapsed().as_millis() as i64;
    info!("{}", output.summary());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{RecordingExecutor, row, v};
    use crate::memory::MemoryLedger;

    fn script(version: &str, description: &str) -> ResolvedMigration {
        ResolvedMigration::versioned_script(v(version), description, format!("-- {}", description))
    }

    #[tokio::test]
    async fn test_migrate_empty_ledger() {
        let ledger = MemoryLedger::default();
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![
            script("2", "two"),
            script("1", "one"),
            ResolvedMigration::repeatable_script("views", "CREATE VIEW v;"),
        ])
        .unwrap();

        let output = execute(&ledger, &catalog, &executor, &MigrationConfig::default())
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.migrations_executed, 3);
        assert_eq!(output.initial_schema_version, None);
        assert_eq!(output.target_version, Some(v("2")));
        assert_eq!(executor.executed(), vec!["1 - one", "2 - two", "R - views"]);

        let rows = ledger.rows();
        let ranks: Vec<i32> = rows.iter().map(|r| r.installed_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert!(rows.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_migrate_up_to_date_is_noop() {
        let m1 = script("1", "one");
        let ledger = MemoryLedger::from_rows(
            "history",
            vec![row(1, Some("1"), "one", MigrationType::Script, m1.checksum, true)],
        );
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![m1]).unwrap();

        let output = execute(&ledger, &catalog, &executor, &MigrationConfig::default())
            .await
            .unwrap();

        assert!(output.is_noop());
        assert_eq!(output.target_version, Some(v("1")));
        assert!(output.summary().contains("up to date"));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_stops_run() {
        let ledger = MemoryLedger::default();
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![
            script("1", "one"),
            ResolvedMigration::versioned_script(v("2"), "broken", "FAIL"),
            script("3", "three"),
        ])
        .unwrap();

        let output = execute(&ledger, &catalog, &executor, &MigrationConfig::default())
            .await
            .unwrap();

        assert!(!output.success());
        assert_eq!(output.migrations_executed, 1);
        assert_eq!(output.target_version, Some(v("1")));
        assert_eq!(executor.executed(), vec!["1 - one", "2 - broken"]);

        let rows = ledger.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].success);
        assert!(!rows[1].success);

        let err = output.into_result().unwrap_err();
        assert!(err.is_migration_failure());
    }

    #[tokio::test]
    async fn test_failed_row_blocks_next_run() {
        let ledger = MemoryLedger::from_rows(
            "history",
            vec![row(1, Some("1"), "one", MigrationType::Script, None, false)],
        );
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![script("1", "one")]).unwrap();
        let config = MigrationConfig::new().validate_on_migrate(false);

        let err = execute(&ledger, &catalog, &executor, &config).await.unwrap_err();
        assert!(err.is_validation());
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_rejected_without_writes() {
        let m2 = script("2", "two");
        let ledger = MemoryLedger::from_rows(
            "history",
            vec![row(1, Some("2"), "two", MigrationType::Script, m2.checksum, true)],
        );
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![script("1", "one"), m2]).unwrap();

        let err = execute(&ledger, &catalog, &executor, &MigrationConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(ledger.len(), 1);

        let config = MigrationConfig::new().out_of_order(true);
        let output = execute(&ledger, &catalog, &executor, &config).await.unwrap();
        assert_eq!(output.migrations_executed, 1);
        assert_eq!(output.initial_schema_version, Some(v("2")));
        assert_eq!(output.target_version, Some(v("1")));
    }

    #[tokio::test]
    async fn test_target_limits_versioned_units() {
        let ledger = MemoryLedger::default();
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![
            script("1", "one"),
            script("2", "two"),
            script("3", "three"),
        ])
        .unwrap();
        let config = MigrationConfig::new().target(v("2"));

        let output = execute(&ledger, &catalog, &executor, &config).await.unwrap();
        assert_eq!(output.migrations_executed, 2);
        assert_eq!(output.target_version, Some(v("2")));
    }

    #[tokio::test]
    async fn test_baseline_on_migrate() {
        let ledger = MemoryLedger::default();
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![script("1", "old"), script("2", "new")]).unwrap();
        let config = MigrationConfig::new().baseline_on_migrate(true);

        let output = execute(&ledger, &catalog, &executor, &config).await.unwrap();

        assert!(output.baselined);
        assert_eq!(output.initial_schema_version, Some(v("1")));
        assert_eq!(executor.executed(), vec!["2 - new"]);
        let rows = ledger.rows();
        assert_eq!(rows[0].migration_type, MigrationType::Baseline);
        assert_eq!(rows[1].version, Some(v("2")));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_blocks_when_validating() {
        let ledger = MemoryLedger::from_rows(
            "history",
            vec![row(1, Some("1"), "one", MigrationType::Script, Some(99), true)],
        );
        let executor = RecordingExecutor::default();
        let catalog = Catalog::new(vec![script("1", "one"), script("2", "two")]).unwrap();

        let err = execute(&ledger, &catalog, &executor, &MigrationConfig::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let lenient = MigrationConfig::new().validate_on_migrate(false);
        let output = execute(&ledger, &catalog, &executor, &lenient).await.unwrap();
        assert_eq!(output.migrations_executed, 1);
    }
}

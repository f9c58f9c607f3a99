//! Seed an empty ledger with a baseline row.

use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use super::read_ledger;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::MigrationExecutor;
use crate::history::LedgerStore;
use crate::migration::{MigrationType, NewAppliedMigration, ResolvedMigration};
use crate::version::Version;

/// Result of a baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineOutput {
    /// Whether the ledger now carries a baseline.
    pub successfully_baselined: bool,
    /// The baseline version in the ledger.
    pub baseline_version: Option<Version>,
    /// Rank of the row written, `None` when nothing was written.
    pub installed_rank: Option<i32>,
    /// Warnings generated during baselining.
    pub warnings: Vec<String>,
}

impl BaselineOutput {
    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        match (&self.baseline_version, self.installed_rank) {
            (Some(v), Some(_)) => format!("Baselined schema at version {}", v),
            (Some(v), None) => format!("Schema already baselined at version {}", v),
            (None, _) => "Schema not baselined".to_string(),
        }
    }
}

/// What a baseline records.
#[derive(Debug, Clone, Copy)]
pub struct BaselineRequest<'a> {
    /// Version of the baseline.
    pub version: &'a Version,
    /// Description recorded on the row.
    pub description: &'a str,
    /// Unit executed before recording, if any.
    pub initializer: Option<&'a ResolvedMigration>,
    /// Value recorded as `installed_by`.
    pub installed_by: &'a str,
}

/// Record a baseline row.
///
/// Without an initializer the row is a pure `BASELINE` marker. With one, the
/// initializer runs first and the row takes its script, checksum and the
/// baseline flavour of its type; a failing initializer is recorded as a
/// failed row and reported as a migration failure.
pub async fn execute<L, E>(
    ledger: &L,
    executor: &E,
    request: BaselineRequest<'_>,
) -> MigrateResult<BaselineOutput>
where
    L: LedgerStore + ?Sized,
    E: MigrationExecutor + ?Sized,
{
    let rows = read_ledger(ledger).await?;

    if let Some(existing) = rows
        .iter()
        .filter(|r| r.success && r.migration_type.is_baseline())
        .max_by_key(|r| r.installed_rank)
    {
        let mut warnings = Vec::new();
        if existing.version.as_ref() != Some(request.version) {
            let message = format!(
                "Ledger {} is already baselined at version {}; requested version {} ignored",
                ledger.table_name(),
                existing
                    .version
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string),
                request.version
            );
            warn!("{}", message);
            warnings.push(message);
        }
        return Ok(BaselineOutput {
            successfully_baselined: true,
            baseline_version: existing.version.clone(),
            installed_rank: None,
            warnings,
        });
    }

    if !rows.is_empty() {
        return Err(MigrationError::validation(format!(
            "Ledger {} already contains {} row(s); baseline only applies to an empty ledger",
            ledger.table_name(),
            rows.len()
        )));
    }

    let row = match request.initializer {
        None => NewAppliedMigration {
            version: Some(request.version.clone()),
            description: request.description.to_string(),
            migration_type: MigrationType::Baseline,
            script: request.description.to_string(),
            checksum: None,
            execution_time_ms: 0,
            success: true,
            installed_by: request.installed_by.to_string(),
            installed_on: Utc::now(),
        },
        Some(initializer) => {
            let start = Instant::now();
            let outcome = executor.execute(initializer).await;
            let elapsed = start.elapsed().as_millis() as i64;

            let mut row = NewAppliedMigration::executed(
                initializer,
                request.installed_by,
                elapsed,
                outcome.is_ok(),
            );
            row.version = Some(request.version.clone());
            row.migration_type = initializer.migration_type.as_baseline();

            if let Err(source) = outcome {
                ledger.append(row).await?;
                warn!(
                    version = %request.version,
                    error = %source,
                    "Baseline initializer failed"
                );
                return Err(MigrationError::migration_failed(
                    Some(request.version.clone()),
                    initializer.description.clone(),
                    source,
                ));
            }
            row
        }
    };

    let rank = ledger.append(row).await?;
    info!(
        table = ledger.table_name(),
        version = %request.version,
        "Baselined schema"
    );

    Ok(BaselineOutput {
        successfully_baselined: true,
        baseline_version: Some(request.version.clone()),
        installed_rank: Some(rank),
        warnings: Vec::new(),
    })
}

//! Bring the ledger back in line with the catalog.

use tracing::{debug, info};

use super::read_ledger;
use crate::catalog::Catalog;
use crate::error::MigrateResult;
use crate::history::{LedgerStore, LedgerUpdate};
use crate::migration::{AppliedMigration, MigrationType};
use crate::version::Version;

/// A ledger row touched by repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutputEntry {
    /// Rank of the row.
    pub installed_rank: i32,
    /// Version, `None` for repeatables.
    pub version: Option<Version>,
    /// Description of the row.
    pub description: String,
    /// Type of the row before repair.
    pub migration_type: MigrationType,
}

impl From<&AppliedMigration> for RepairOutputEntry {
    fn from(row: &AppliedMigration) -> Self {
        Self {
            installed_rank: row.installed_rank,
            version: row.version.clone(),
            description: row.description.clone(),
            migration_type: row.migration_type,
        }
    }
}

/// Result of a repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairOutput {
    /// Failed rows removed from the ledger.
    pub migrations_removed: Vec<RepairOutputEntry>,
    /// Rows marked deleted because their unit is gone.
    pub migrations_deleted: Vec<RepairOutputEntry>,
    /// Rows whose checksum was realigned with the catalog.
    pub migrations_aligned: Vec<RepairOutputEntry>,
}

impl RepairOutput {
    /// Check if repair changed nothing.
    pub fn is_empty(&self) -> bool {
        self.migrations_removed.is_empty()
            && self.migrations_deleted.is_empty()
            && self.migrations_aligned.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "Ledger is consistent, nothing to repair".to_string();
        }
        format!(
            "{} removed, {} deleted, {} aligned",
            self.migrations_removed.len(),
            self.migrations_deleted.len(),
            self.migrations_aligned.len()
        )
    }
}

/// Repair the ledger.
///
/// Failed rows are removed. Successful rows whose unit no longer resolves
/// are marked deleted, except versioned rows above the highest resolved
/// version, which belong to a newer deployment. Versioned rows whose
/// checksum drifted from the catalog take the catalog checksum, baseline
/// initializer rows included. Pure baseline markers, initializer rows whose
/// unit is gone and rows already deleted are left alone, so a second run is
/// a no-op.
pub async fn execute<L: LedgerStore + ?Sized>(
    ledger: &L,
    catalog: &Catalog,
) -> MigrateResult<RepairOutput> {
    let rows = read_ledger(ledger).await?;
    let ceiling = catalog.highest_version();
    let mut output = RepairOutput::default();

    for row in &rows {
        if row.migration_type.is_marker() {
            continue;
        }

        if !row.success {
            ledger.remove(row.installed_rank).await?;
            debug!(rank = row.installed_rank, migration = %row.identity(), "Removed failed row");
            output.migrations_removed.push(row.into());
            continue;
        }

        if row.migration_type == MigrationType::Baseline {
            continue;
        }

        match catalog.find(&row.identity()) {
            None if row.migration_type.is_baseline() => {}
            None => {
                let within_catalog = match &row.version {
                    Some(version) => ceiling.is_some_and(|c| version <= c),
                    None => true,
                };
                if within_catalog {
                    ledger.mark_deleted(row.installed_rank).await?;
                    debug!(
                        rank = row.installed_rank,
                        migration = %row.identity(),
                        "Marked row deleted"
                    );
                    output.migrations_deleted.push(row.into());
                }
            }
            Some(resolved) => {
                if row.is_versioned() && row.checksum != resolved.checksum {
                    ledger
                        .update(row.installed_rank, LedgerUpdate::checksum(resolved.checksum))
                        .await?;
                    debug!(
                        rank = row.installed_rank,
                        migration = %row.identity(),
                        from = ?row.checksum,
                        to = ?resolved.checksum,
                        "Aligned checksum"
                    );
                    output.migrations_aligned.push(row.into());
                }
            }
        }
    }

    info!(table = ledger.table_name(), "{}", output.summary());
    Ok(output)
}

//! Ledger operations.
//!
//! Each command assumes the caller already holds the ledger lock when it
//! mutates the ledger; [`MigrationEngine`](crate::engine::MigrationEngine)
//! takes care of that.

pub mod baseline;
pub mod liberate;
pub mod migrate;
pub mod repair;
pub mod validate;

use crate::error::MigrateResult;
use crate::history::{LedgerStore, check_consistency};
use crate::migration::AppliedMigration;

/// Read the ledger and reject corrupted rank sequences.
pub(crate) async fn read_ledger<L: LedgerStore + ?Sized>(
    ledger: &L,
) -> MigrateResult<Vec<AppliedMigration>> {
    let rows = ledger.read_all().await?;
    check_consistency(&rows)?;
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use parking_lot::Mutex;

    use crate::error::{MigrateResult, MigrationError};
    use crate::executor::MigrationExecutor;
    use crate::migration::{AppliedMigration, MigrationType, ResolvedMigration};
    use crate::version::Version;

    pub fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    pub fn row(
        rank: i32,
        version: Option<&str>,
        description: &str,
        migration_type: MigrationType,
        checksum: Option<i32>,
        success: bool,
    ) -> AppliedMigration {
        AppliedMigration {
            installed_rank: rank,
            version: version.map(v),
            description: description.to_string(),
            migration_type,
            script: description.to_string(),
            checksum,
            execution_time_ms: 1,
            success,
            installed_by: "test".to_string(),
            installed_on: Utc::now(),
        }
    }

    /// Executor recording what ran; scripts containing `FAIL` error out.
    #[derive(Default)]
    pub struct RecordingExecutor {
        pub executed: Mutex<Vec<String>>,
    }

    impl RecordingExecutor {
        pub fn executed(&self) -> Vec<String> {
            self.executed.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl MigrationExecutor for RecordingExecutor {
        async fn execute(&self, migration: &ResolvedMigration) -> MigrateResult<()> {
            self.executed.lock().push(migration.identity().to_string());
            match &migration.body {
                crate::migration::MigrationBody::Script(sql) if sql.contains("FAIL") => {
                    Err(MigrationError::execution("statement failed"))
                }
                _ => Ok(()),
            }
        }
    }
}

//! Migration ledger (schema history) storage.

use crate::checksum::name_key;
use crate::error::{MigrateResult, MigrationError};
use crate::migration::{AppliedMigration, MigrationType, NewAppliedMigration};

/// Default name of the ledger table.
pub const DEFAULT_HISTORY_TABLE: &str = "tidemark_schema_history";

/// Fields that may be rewritten on an existing ledger row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerUpdate {
    /// New checksum, if it changes.
    pub checksum: Option<Option<i32>>,
    /// New type, if it changes.
    pub migration_type: Option<MigrationType>,
}

impl LedgerUpdate {
    /// Update that realigns the checksum.
    pub fn checksum(checksum: Option<i32>) -> Self {
        Self {
            checksum: Some(checksum),
            ..Default::default()
        }
    }

    /// Check if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.checksum.is_none() && self.migration_type.is_none()
    }

    /// Apply the update to a row in place.
    pub fn apply_to(&self, row: &mut AppliedMigration) {
        if let Some(checksum) = self.checksum {
            row.checksum = checksum;
        }
        if let Some(migration_type) = self.migration_type {
            row.migration_type = migration_type;
        }
    }
}

/// Durable, append-mostly ledger of applied migrations.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Name of the ledger table.
    fn table_name(&self) -> &str;

    /// Create the ledger table if it does not exist.
    async fn initialize(&self) -> MigrateResult<()>;

    /// All rows ordered by installed rank.
    async fn read_all(&self) -> MigrateResult<Vec<AppliedMigration>>;

    /// Append a row and return its assigned rank.
    async fn append(&self, row: NewAppliedMigration) -> MigrateResult<i32>;

    /// Rewrite fields of the row at `rank`.
    async fn update(&self, rank: i32, update: LedgerUpdate) -> MigrateResult<()>;

    /// Flag the row at `rank` as deleted without removing it.
    async fn mark_deleted(&self, rank: i32) -> MigrateResult<()> {
        self.update(
            rank,
            LedgerUpdate {
                migration_type: Some(MigrationType::Deleted),
                ..Default::default()
            },
        )
        .await
    }

    /// Physically remove the row at `rank`.
    async fn remove(&self, rank: i32) -> MigrateResult<()>;

    /// Acquire an exclusive lock on the ledger.
    async fn acquire_lock(&self) -> MigrateResult<LedgerLock>;
}

/// Read access to a ledger written by another tool.
#[async_trait::async_trait]
pub trait ForeignLedgerReader: Send + Sync {
    /// Name of the foreign table.
    fn table_name(&self) -> &str;

    /// All foreign rows ordered by installed rank.
    async fn read_all(&self) -> MigrateResult<Vec<ForeignRow>>;
}

/// Foreign ledger rows share the native row shape.
pub type ForeignRow = AppliedMigration;

/// Exclusive ledger lock, released on drop.
pub struct LedgerLock {
    lock_id: i64,
    release_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl LedgerLock {
    /// Create a new ledger lock.
    pub fn new(lock_id: i64, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            lock_id,
            release_fn: Some(Box::new(release)),
        }
    }

    /// Get the lock ID.
    pub fn id(&self) -> i64 {
        self.lock_id
    }
}

impl std::fmt::Debug for LedgerLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerLock")
            .field("lock_id", &self.lock_id)
            .finish()
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Some(release) = self.release_fn.take() {
            release();
        }
    }
}

/// Advisory lock key scoped to a ledger table.
pub fn advisory_lock_key(table: &str) -> i64 {
    name_key(table)
}

/// Reject ledgers whose ranks are duplicated or out of order, or which hold
/// rows only a foreign tool writes.
pub fn check_consistency(rows: &[AppliedMigration]) -> MigrateResult<()> {
    for pair in rows.windows(2) {
        if pair[1].installed_rank <= pair[0].installed_rank {
            return Err(MigrationError::consistency(format!(
                "installed rank {} follows rank {}",
                pair[1].installed_rank, pair[0].installed_rank
            )));
        }
    }

    if let Some(row) = rows.iter().find(|r| r.migration_type.is_undo()) {
        return Err(MigrationError::consistency(format!(
            "rank {} holds a foreign {} row; liberate the ledger first",
            row.installed_rank, row.migration_type
        )));
    }

    Ok(())
}

//! In-memory ledger store.
//!
//! Useful for embedding the engine where the ledger lives in process, and as
//! the ledger of choice in tests. It also serves as a foreign ledger reader so
//! a second instance can stand in for another tool's history table.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MigrateResult, MigrationError};
use crate::history::{
    DEFAULT_HISTORY_TABLE, ForeignLedgerReader, ForeignRow, LedgerLock, LedgerStore, LedgerUpdate,
    advisory_lock_key,
};
use crate::migration::{AppliedMigration, NewAppliedMigration};

#[derive(Debug, Default)]
struct LedgerState {
    rows: Vec<AppliedMigration>,
    next_rank: i32,
}

/// Ledger held in memory.
#[derive(Debug)]
pub struct MemoryLedger {
    table: String,
    state: Mutex<LedgerState>,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_TABLE)
    }
}

impl MemoryLedger {
    /// Create an empty ledger for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: Mutex::new(LedgerState {
                rows: Vec::new(),
                next_rank: 1,
            }),
            lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create a ledger holding `rows` with their ranks as given.
    pub fn from_rows(table: impl Into<String>, mut rows: Vec<AppliedMigration>) -> Self {
        rows.sort_by_key(|r| r.installed_rank);
        let next_rank = rows.last().map_or(1, |r| r.installed_rank + 1);
        let ledger = Self::new(table);
        *ledger.state.lock() = LedgerState { rows, next_rank };
        ledger
    }

    /// Snapshot of the current rows.
    pub fn rows(&self) -> Vec<AppliedMigration> {
        self.state.lock().rows.clone()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    /// Check if the ledger has no rows.
    pub fn is_empty(&self) -> bool {
        self.state.lock().rows.is_empty()
    }

    /// Check if someone holds the ledger lock.
    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    fn with_row<T>(
        &self,
        rank: i32,
        f: impl FnOnce(&mut Vec<AppliedMigration>, usize) -> T,
    ) -> MigrateResult<T> {
        let mut state = self.state.lock();
        let index = state
            .rows
            .iter()
            .position(|r| r.installed_rank == rank)
            .ok_or_else(|| {
                MigrationError::database(format!(
                    "no row with installed rank {} in {}",
                    rank, self.table
                ))
            })?;
        Ok(f(&mut state.rows, index))
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn initialize(&self) -> MigrateResult<()> {
        Ok(())
    }

    async fn read_all(&self) -> MigrateResult<Vec<AppliedMigration>> {
        Ok(self.rows())
    }

    async fn append(&self, row: NewAppliedMigration) -> MigrateResult<i32> {
        let mut state = self.state.lock();
        let rank = state.next_rank;
        state.next_rank += 1;
        state.rows.push(row.into_applied(rank));
        Ok(rank)
    }

    async fn update(&self, rank: i32, update: LedgerUpdate) -> MigrateResult<()> {
        self.with_row(rank, |rows, i| update.apply_to(&mut rows[i]))
    }

    async fn remove(&self, rank: i32) -> MigrateResult<()> {
        self.with_row(rank, |rows, i| {
            rows.remove(i);
        })
    }

    async fn acquire_lock(&self) -> MigrateResult<LedgerLock> {
        let guard = self.lock.clone().lock_owned().await;
        Ok(LedgerLock::new(advisory_lock_key(&self.table), move || drop(guard)))
    }
}

#[async_trait::async_trait]
impl ForeignLedgerReader for MemoryLedger {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn read_all(&self) -> MigrateResult<Vec<ForeignRow>> {
        Ok(self.rows())
    }
}

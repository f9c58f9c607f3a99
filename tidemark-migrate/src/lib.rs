//! # tidemark-migrate
//!
//! Migration engine built around a schema history ledger.
//!
//! The ledger is an append-mostly table recording every migration applied
//! to a database. The engine reconciles it against the catalog of
//! migrations available locally and offers four operations on top:
//!
//! - **migrate** runs pending migrations in order and records each attempt
//! - **baseline** seeds an empty ledger so older migrations are skipped
//! - **repair** removes failed rows, marks vanished migrations deleted and
//!   realigns drifted checksums
//! - **liberate** imports the ledger of another migration tool
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ Catalog      │────▶│ Reconciler     │◀────│ Ledger Store │
//! └──────────────┘     └────────────────┘     └──────────────┘
//!                              │                     ▲
//!                              ▼                     │
//!                      ┌────────────────┐     ┌──────────────┐
//!                      │ Commands       │────▶│ Executor     │
//!                      └────────────────┘     └──────────────┘
//! ```
//!
//! Reconciliation is pure: [`reconcile`] takes the catalog and ledger rows
//! and derives a [`MigrationState`] per unit. The commands decide what to
//! write from that view; the [`LedgerStore`] and [`MigrationExecutor`]
//! traits are the only places that touch a database.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tidemark_migrate::{
//!     BodyExecutor, MemoryLedger, MigrateResult, MigrationConfig, MigrationEngine,
//!     ResolvedMigration, SqlRunner,
//! };
//!
//! struct Noop;
//!
//! #[async_trait::async_trait]
//! impl SqlRunner for Noop {
//!     async fn execute_sql(&self, _sql: &str) -> MigrateResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> MigrateResult<()> {
//! let catalog = vec![
//!     ResolvedMigration::versioned_script("1".parse()?, "create users", "CREATE TABLE users;"),
//!     ResolvedMigration::repeatable_script("user view", "CREATE OR REPLACE VIEW v AS SELECT 1;"),
//! ];
//!
//! let engine = MigrationEngine::new(
//!     MigrationConfig::new(),
//!     MemoryLedger::default(),
//!     catalog,
//!     BodyExecutor::new(Noop),
//! );
//!
//! let output = engine.migrate().await?.into_result()?;
//! println!("{}", output.summary());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod checksum;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod history;
pub mod info;
pub mod logging;
pub mod memory;
pub mod migration;
pub mod version;

// Re-exports
pub use catalog::{Catalog, MigrationCatalog};
pub use checksum::{ChecksumCalculator, name_key, script_checksum};
pub use commands::baseline::{BaselineOutput, BaselineRequest};
pub use commands::liberate::{LiberateAction, LiberateActionKind, LiberateOutput};
pub use commands::migrate::{MigrateOutput, MigrateOutputEntry};
pub use commands::repair::{RepairOutput, RepairOutputEntry};
pub use commands::validate::{ValidateOutput, ValidationIssue};
pub use config::MigrationConfig;
pub use engine::MigrationEngine;
pub use error::{MigrateResult, MigrationError};
pub use executor::{BodyExecutor, MigrationExecutor, SqlRunner};
pub use history::{
    DEFAULT_HISTORY_TABLE, ForeignLedgerReader, ForeignRow, LedgerLock, LedgerStore, LedgerUpdate,
};
pub use info::{MigrationInfo, MigrationInfoService, MigrationState, reconcile};
pub use memory::MemoryLedger;
pub use migration::{
    AppliedMigration, CodeMigration, MigrationBody, MigrationIdentity, MigrationType,
    NewAppliedMigration, ResolvedMigration,
};
pub use version::Version;

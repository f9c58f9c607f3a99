//! # Tidemark
//!
//! Versioned schema migrations with a reconcilable history ledger.
//!
//! Tidemark provides:
//! - Version-ordered and repeatable migrations, as SQL scripts or code
//! - A history ledger recording every attempt, with checksums
//! - Baselining of existing databases
//! - Repair of failed, vanished and drifted ledger rows
//! - Import of another tool's history table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidemark::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> MigrateResult<()> {
//!     tidemark::logging::init();
//!
//!     let config = MigrationConfig::load("tidemark.toml").await?;
//!     let engine = MigrationEngine::new(config, ledger, catalog, BodyExecutor::new(runner));
//!
//!     let info = engine.info().await?;
//!     for migration in info.all() {
//!         println!("{}", migration);
//!     }
//!
//!     engine.migrate().await?.into_result()?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The migration engine.
pub mod migrate {
    pub use tidemark_migrate::*;
}

/// Ledger operations.
pub use tidemark_migrate::commands;

/// Logging setup.
pub use tidemark_migrate::logging;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tidemark_migrate::{
        BodyExecutor, Catalog, CodeMigration, ForeignLedgerReader, LedgerStore, MemoryLedger,
        MigrateResult, MigrationCatalog, MigrationConfig, MigrationEngine, MigrationError,
        MigrationExecutor, MigrationState, ResolvedMigration, SqlRunner, Version,
    };
}

// Re-export key types at the crate root
pub use tidemark_migrate::{MigrateResult, MigrationConfig, MigrationEngine, MigrationError};

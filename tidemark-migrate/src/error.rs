//! Error types for the migration engine.

use thiserror::Error;

use crate::version::Version;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger or database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid version string.
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Unknown migration type tag.
    #[error("Unknown migration type '{0}'")]
    UnknownMigrationType(String),

    /// The run was rejected before anything was executed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A single migration unit failed while executing.
    #[error("Migration {identity} failed: {source}")]
    MigrationFailed {
        /// Display identity of the failing unit (`1.2 - create users` or `R - views`).
        identity: String,
        /// Version of the failing unit, `None` for repeatables.
        version: Option<Version>,
        /// Description of the failing unit.
        description: String,
        /// The underlying execution error.
        #[source]
        source: Box<MigrationError>,
    },

    /// Error raised by a unit body while executing.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The ledger contents are corrupted or were tampered with.
    #[error("Ledger consistency error: {0}")]
    Consistency(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire migration lock: {0}")]
    LockFailed(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a consistency error.
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Create a lock failed error.
    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::LockFailed(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an execution error with the identity of the unit that raised it.
    pub fn migration_failed(
        version: Option<Version>,
        description: impl Into<String>,
        source: MigrationError,
    ) -> Self {
        let description = description.into();
        let identity = match &version {
            Some(v) => format!("{} - {}", v, description),
            None => format!("R - {}", description),
        };
        Self::MigrationFailed {
            identity,
            version,
            description,
            source: Box::new(source),
        }
    }

    /// Check if the run was rejected before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a failed unit execution.
    pub fn is_migration_failure(&self) -> bool {
        matches!(self, Self::MigrationFailed { .. })
    }

    /// Check if this is a recoverable error.
    ///
    /// Lock contention clears once the other holder finishes; everything else
    /// needs a change to the catalog or the ledger first.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockFailed(_))
    }
}

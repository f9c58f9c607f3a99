//! Validation of the ledger against the catalog.

use std::fmt;

use crate::catalog::Catalog;
use crate::config::MigrationConfig;
use crate::error::{MigrateResult, MigrationError};
use crate::info::{MigrationState, highest_applied_version, reconcile};
use crate::migration::{AppliedMigration, MigrationIdentity, MigrationType};
use crate::version::Version;

/// A problem that blocks migrating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A successful versioned row disagrees with its resolved checksum.
    ChecksumMismatch {
        /// The unit.
        identity: MigrationIdentity,
        /// Checksum in the ledger.
        applied: Option<i32>,
        /// Checksum of the resolved unit.
        resolved: Option<i32>,
    },
    /// Applied, but no longer resolved.
    Missing {
        /// The unit.
        identity: MigrationIdentity,
    },
    /// Applied at a version above everything in the catalog.
    Future {
        /// The unit.
        identity: MigrationIdentity,
    },
    /// The latest attempt failed and was never cleaned up.
    Failed {
        /// The unit.
        identity: MigrationIdentity,
    },
    /// Pending below the highest applied version.
    OutOfOrder {
        /// The unit.
        identity: MigrationIdentity,
        /// Highest successfully applied version.
        highest_applied: Version,
    },
    /// Ledger and catalog disagree on how the unit executes.
    TypeMismatch {
        /// The unit.
        identity: MigrationIdentity,
        /// Type in the ledger.
        applied: MigrationType,
        /// Type of the resolved unit.
        resolved: MigrationType,
    },
}

impl ValidationIssue {
    /// Issues checked even when validate-on-migrate is off.
    pub fn always_blocks_migrate(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::OutOfOrder { .. })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch {
                identity,
                applied,
                resolved,
            } => write!(
                f,
                "checksum mismatch for migration {}: applied {:?}, resolved {:?}",
                identity, applied, resolved
            ),
            Self::Missing { identity } => write!(
                f,
                "applied migration {} is not resolved locally",
                identity
            ),
            Self::Future { identity } => write!(
                f,
                "applied migration {} is newer than any resolved migration",
                identity
            ),
            Self::Failed { identity } => write!(
                f,
                "detected failed migration {}; clean up its changes and run repair",
                identity
            ),
            Self::OutOfOrder {
                identity,
                highest_applied,
            } => write!(
                f,
                "pending migration {} is below applied version {}; enable out-of-order to run it",
                identity, highest_applied
            ),
            Self::TypeMismatch {
                identity,
                applied,
                resolved,
            } => write!(
                f,
                "migration type mismatch for {}: applied {}, resolved {}",
                identity, applied, resolved
            ),
        }
    }
}

/// Result of validation.
#[derive(Debug, Clone, Default)]
pub struct ValidateOutput {
    /// Number of infos checked.
    pub validated: usize,
    /// Problems found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidateOutput {
    /// Check if nothing blocks migrating.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Turn issues into a validation error.
    pub fn into_result(self) -> MigrateResult<Self> {
        if self.is_valid() {
            return Ok(self);
        }
        let messages: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
        Err(MigrationError::validation(messages.join("; ")))
    }
}

/// Validate the ledger against the catalog.
pub fn execute(
    catalog: &Catalog,
    rows: &[AppliedMigration],
    config: &MigrationConfig,
) -> ValidateOutput {
    let infos = reconcile(catalog, rows);
    let highest = highest_applied_version(rows);
    let mut issues = Vec::new();

    for info in &infos {
        let identity = info.identity();

        if info.applied().is_some_and(|a| !a.success) {
            issues.push(ValidationIssue::Failed { identity });
            continue;
        }

        match info.state() {
            MigrationState::Missing if info.is_future() => {
                if !config.ignore_future {
                    issues.push(ValidationIssue::Future { identity });
                }
            }
            MigrationState::Missing => {
                if !config.ignore_missing {
                    issues.push(ValidationIssue::Missing { identity });
                }
            }
            MigrationState::Pending => {
                if let (Some(version), Some(highest)) = (info.version(), highest)
                    && version < highest
                    && !config.out_of_order
                {
                    issues.push(ValidationIssue::OutOfOrder {
                        identity,
                        highest_applied: highest.clone(),
                    });
                }
            }
            MigrationState::Success | MigrationState::Outdated => {
                let (Some(applied), Some(resolved)) = (info.applied(), info.resolved()) else {
                    continue;
                };
                if applied.migration_type != MigrationType::Baseline
                    && !applied
                        .migration_type
                        .is_compatible_with(&resolved.migration_type)
                {
                    issues.push(ValidationIssue::TypeMismatch {
                        identity,
                        applied: applied.migration_type,
                        resolved: resolved.migration_type,
                    });
                } else if !info.checksum_matches() {
                    issues.push(ValidationIssue::ChecksumMismatch {
                        identity,
                        applied: applied.checksum,
                        resolved: resolved.checksum,
                    });
                }
            }
            MigrationState::Failed | MigrationState::Ignored => {}
        }
    }

    ValidateOutput {
        validated: infos.len(),
        issues,
    }
}

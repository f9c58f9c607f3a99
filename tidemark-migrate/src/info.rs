//! Reconciliation of resolved migrations against the ledger.
//!
//! Every read of migration status goes through [`reconcile`]: ledger rows are
//! grouped by identity, the latest row of each group (by installed rank)
//! is matched to its resolved unit, and a [`MigrationState`] is derived.
//! Nothing here is persisted.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::migration::{AppliedMigration, MigrationIdentity, MigrationType, ResolvedMigration};
use crate::version::Version;

/// Derived state of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationState {
    /// Resolved, not yet applied.
    Pending,
    /// Applied successfully.
    Success,
    /// Latest attempt failed.
    Failed,
    /// Repeatable whose content changed since it last ran.
    Outdated,
    /// Applied, but no longer resolved.
    Missing,
    /// Resolved, but below the baseline floor; will never run.
    Ignored,
}

impl MigrationState {
    /// Check if a ledger row backs this state.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Outdated | Self::Missing
        )
    }

    /// Display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Outdated => "Outdated",
            Self::Missing => "Missing",
            Self::Ignored => "Ignored",
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved unit merged with its latest ledger row.
#[derive(Debug, Clone)]
pub struct MigrationInfo {
    resolved: Option<ResolvedMigration>,
    applied: Option<AppliedMigration>,
    state: MigrationState,
    future: bool,
    checksum_mismatch: bool,
}

impl MigrationInfo {
    /// The derived state.
    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// The resolved unit, if still available.
    pub fn resolved(&self) -> Option<&ResolvedMigration> {
        self.resolved.as_ref()
    }

    /// The latest matching ledger row, if any.
    pub fn applied(&self) -> Option<&AppliedMigration> {
        self.applied.as_ref()
    }

    /// Version of the unit.
    pub fn version(&self) -> Option<&Version> {
        match (&self.resolved, &self.applied) {
            (Some(r), _) => r.version.as_ref(),
            (None, Some(a)) => a.version.as_ref(),
            (None, None) => None,
        }
    }

    /// Description of the unit.
    pub fn description(&self) -> &str {
        match (&self.resolved, &self.applied) {
            (Some(r), _) => &r.description,
            (None, Some(a)) => &a.description,
            (None, None) => "",
        }
    }

    /// Type as recorded in the ledger, or as resolved if never applied.
    pub fn migration_type(&self) -> Option<MigrationType> {
        self.applied
            .as_ref()
            .map(|a| a.migration_type)
            .or_else(|| self.resolved.as_ref().map(|r| r.migration_type))
    }

    /// Identity of the unit.
    pub fn identity(&self) -> MigrationIdentity {
        MigrationIdentity::new(self.version(), self.description())
    }

    /// Check if this is a versioned unit.
    pub fn is_versioned(&self) -> bool {
        self.version().is_some()
    }

    /// Unmatched row versioned above everything in the catalog.
    pub fn is_future(&self) -> bool {
        self.future
    }

    /// False when a successful versioned row disagrees with its resolved checksum.
    pub fn checksum_matches(&self) -> bool {
        !self.checksum_mismatch
    }
}

impl fmt::Display for MigrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.identity(), self.state)
    }
}

/// Highest version among successful, non-marker ledger rows.
pub fn highest_applied_version(rows: &[AppliedMigration]) -> Option<&Version> {
    rows.iter()
        .filter(|r| r.success && !r.migration_type.is_marker())
        .filter_map(|r| r.version.as_ref())
        .max()
}

/// Baseline floor recorded in the ledger.
pub fn baseline_floor(rows: &[AppliedMigration]) -> Option<&Version> {
    rows.iter()
        .filter(|r| r.success && r.migration_type.is_baseline())
        .filter_map(|r| r.version.as_ref())
        .max()
}

/// Diff the catalog against the ledger.
///
/// Versioned infos come first, ordered by version (ties keep catalog order,
/// then rank), followed by repeatable infos ordered by description.
pub fn reconcile(catalog: &Catalog, rows: &[AppliedMigration]) -> Vec<MigrationInfo> {
    let floor = baseline_floor(rows).cloned();
    let ceiling = catalog.highest_version().cloned();
    let below_floor = |v: &Version| floor.as_ref().is_some_and(|f| v <= f);

    // Keyed in order of first appearance; later rows replace earlier ones.
    let mut latest: IndexMap<MigrationIdentity, &AppliedMigration> = IndexMap::new();
    for row in rows.iter().filter(|r| !r.migration_type.is_marker()) {
        latest.insert(row.identity(), row);
    }

    let mut infos = Vec::with_capacity(catalog.len() + latest.len());

    for resolved in catalog.migrations() {
        let identity = resolved.identity();
        let info = match latest.shift_remove(&identity) {
            None => {
                let state = match &resolved.version {
                    Some(v) if below_floor(v) => MigrationState::Ignored,
                    _ => MigrationState::Pending,
                };
                MigrationInfo {
                    resolved: Some(resolved.clone()),
                    applied: None,
                    state,
                    future: false,
                    checksum_mismatch: false,
                }
            }
            Some(row) => {
                let differs = row.migration_type != MigrationType::Baseline
                    && row.checksum != resolved.checksum;
                let (state, checksum_mismatch) = if !row.success {
                    (MigrationState::Failed, false)
                } else if !differs {
                    (MigrationState::Success, false)
                } else if resolved.is_repeatable() {
                    (MigrationState::Outdated, false)
                } else {
                    (MigrationState::Success, true)
                };
                MigrationInfo {
                    resolved: Some(resolved.clone()),
                    applied: Some(row.clone()),
                    state,
                    future: false,
                    checksum_mismatch,
                }
            }
        };
        infos.push(info);
    }

    for row in latest.into_values() {
        let state = if row.migration_type.is_baseline() && row.success {
            MigrationState::Success
        } else {
            match &row.version {
                Some(v) if below_floor(v) => continue,
                _ => MigrationState::Missing,
            }
        };
        let future = state == MigrationState::Missing
            && row
                .version
                .as_ref()
                .is_some_and(|v| ceiling.as_ref().is_none_or(|c| v > c));

        infos.push(MigrationInfo {
            resolved: None,
            applied: Some(row.clone()),
            state,
            future,
            checksum_mismatch: false,
        });
    }

    let (mut versioned, mut repeatable): (Vec<_>, Vec<_>) =
        infos.into_iter().partition(MigrationInfo::is_versioned);
    versioned.sort_by(|a, b| a.version().cmp(&b.version()));
    repeatable.sort_by(|a, b| a.description().cmp(b.description()));
    versioned.extend(repeatable);
    versioned
}

/// Queryable view over reconciled migrations.
#[derive(Debug, Clone)]
pub struct MigrationInfoService {
    infos: Vec<MigrationInfo>,
}

impl MigrationInfoService {
    /// Reconcile and wrap the result.
    pub fn new(catalog: &Catalog, rows: &[AppliedMigration]) -> Self {
        Self {
            infos: reconcile(catalog, rows),
        }
    }

    /// Every info in reconciliation order.
    pub fn all(&self) -> &[MigrationInfo] {
        &self.infos
    }

    /// Infos in a given state.
    pub fn in_state(&self, state: MigrationState) -> Vec<&MigrationInfo> {
        self.infos.iter().filter(|i| i.state() == state).collect()
    }

    /// Units that migrate would run: pending versioned units, then pending or
    /// outdated repeatables.
    pub fn pending(&self) -> Vec<&MigrationInfo> {
        self.infos
            .iter()
            .filter(|i| match i.state() {
                MigrationState::Pending => true,
                MigrationState::Outdated => !i.is_versioned(),
                _ => false,
            })
            .collect()
    }

    /// Infos backed by a ledger row.
    pub fn applied(&self) -> Vec<&MigrationInfo> {
        self.infos.iter().filter(|i| i.applied().is_some()).collect()
    }

    /// Infos whose latest attempt failed, resolved or not.
    pub fn failed(&self) -> Vec<&MigrationInfo> {
        self.infos
            .iter()
            .filter(|i| i.applied().is_some_and(|a| !a.success))
            .collect()
    }

    /// The highest successfully applied versioned info.
    pub fn current(&self) -> Option<&MigrationInfo> {
        self.infos
            .iter()
            .filter(|i| i.applied().is_some_and(|a| a.success) && i.is_versioned())
            .max_by(|a, b| a.version().cmp(&b.version()))
    }

    /// Version of [`current`](Self::current).
    pub fn current_version(&self) -> Option<&Version> {
        self.current().and_then(MigrationInfo::version)
    }
}

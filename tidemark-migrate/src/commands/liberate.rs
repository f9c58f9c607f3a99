//! Import history from a foreign tool's ledger.
//!
//! Undo and delete markers have no counterpart here. They are dropped, and
//! each successful marker also drops the most recent earlier row it undid,
//! so the imported ledger describes what is actually applied.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use super::read_ledger;
use crate::catalog::Catalog;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{ForeignLedgerReader, ForeignRow, LedgerStore};
use crate::migration::MigrationType;
use crate::version::Version;

/// What happened to a foreign row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiberateActionKind {
    /// Undo marker dropped.
    SkippedUndo,
    /// Row reverted by a later undo marker.
    SkippedUndone,
    /// Delete marker dropped.
    SkippedDeleted,
    /// Row voided by a later delete marker.
    SkippedDeletedTarget,
    /// Script row copied.
    CopiedScript,
    /// Code row copied.
    CopiedCode,
    /// Baseline row copied.
    CopiedBaseline,
}

impl LiberateActionKind {
    /// Tag reported for the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedUndo => "skipped undo migration",
            Self::SkippedUndone => "skipped undone migration",
            Self::SkippedDeleted => "skipped deleted migration",
            Self::SkippedDeletedTarget => "skipped deleted target migration",
            Self::CopiedScript => "copied script migration",
            Self::CopiedCode => "copied code migration",
            Self::CopiedBaseline => "copied baseline migration",
        }
    }

    /// Check if the row was written to the new ledger.
    pub fn is_copy(&self) -> bool {
        matches!(
            self,
            Self::CopiedScript | Self::CopiedCode | Self::CopiedBaseline
        )
    }
}

impl fmt::Display for LiberateActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One foreign row and its fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiberateAction {
    /// What happened.
    pub kind: LiberateActionKind,
    /// Rank in the foreign ledger.
    pub installed_rank: i32,
    /// Version, `None` for repeatables.
    pub version: Option<Version>,
    /// Description of the row.
    pub description: String,
    /// Type of the foreign row.
    pub migration_type: MigrationType,
}

/// Result of a liberate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiberateOutput {
    /// Foreign table read.
    pub old_schema_history_table: String,
    /// Ledger written.
    pub schema_history_table: String,
    /// One action per foreign row, in foreign rank order.
    pub actions: Vec<LiberateAction>,
    /// Warnings generated during the import.
    pub warnings: Vec<String>,
}

impl LiberateOutput {
    /// Number of actions of a kind.
    pub fn count(&self, kind: LiberateActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    /// Number of rows written.
    pub fn copied(&self) -> usize {
        self.actions.iter().filter(|a| a.kind.is_copy()).count()
    }
}

fn copy_kind(migration_type: MigrationType) -> LiberateActionKind {
    match migration_type {
        MigrationType::Code => LiberateActionKind::CopiedCode,
        t if t.is_baseline() => LiberateActionKind::CopiedBaseline,
        _ => LiberateActionKind::CopiedScript,
    }
}

/// Decide the fate of every foreign row, in rank order.
pub fn plan(rows: &[ForeignRow]) -> Vec<LiberateActionKind> {
    let mut voided: HashMap<usize, LiberateActionKind> = HashMap::new();

    for (i, marker) in rows.iter().enumerate() {
        if !marker.success || !marker.migration_type.is_marker() {
            continue;
        }
        let kind = if marker.migration_type.is_undo() {
            LiberateActionKind::SkippedUndone
        } else {
            LiberateActionKind::SkippedDeletedTarget
        };
        let identity = marker.identity();
        let target = (0..i).rev().find(|&j| {
            !rows[j].migration_type.is_marker()
                && !voided.contains_key(&j)
                && rows[j].identity() == identity
        });
        if let Some(j) = target {
            voided.insert(j, kind);
        }
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| match row.migration_type {
            t if t.is_undo() => LiberateActionKind::SkippedUndo,
            MigrationType::Deleted => LiberateActionKind::SkippedDeleted,
            t => voided.get(&i).copied().unwrap_or_else(|| copy_kind(t)),
        })
        .collect()
}

/// Copy a foreign ledger into an empty ledger.
pub async fn execute<F, L>(
    foreign: &F,
    catalog: &Catalog,
    ledger: &L,
) -> MigrateResult<LiberateOutput>
where
    F: ForeignLedgerReader + ?Sized,
    L: LedgerStore + ?Sized,
{
    let mut rows = foreign.read_all().await?;
    rows.sort_by_key(|r| r.installed_rank);

    let existing = read_ledger(ledger).await?;
    if !existing.is_empty() {
        return Err(MigrationError::validation(format!(
            "Ledger {} already contains {} row(s); liberate only writes to an empty ledger",
            ledger.table_name(),
            existing.len()
        )));
    }

    let kinds = plan(&rows);
    let mut output = LiberateOutput {
        old_schema_history_table: foreign.table_name().to_string(),
        schema_history_table: ledger.table_name().to_string(),
        actions: Vec::with_capacity(rows.len()),
        warnings: Vec::new(),
    };

    for (row, kind) in rows.iter().zip(kinds) {
        if kind.is_copy() {
            ledger.append(row.to_new()).await?;
            if !row.migration_type.is_baseline() && catalog.find(&row.identity()).is_none() {
                let message = format!(
                    "Copied migration {} is not resolved locally; run repair to reconcile",
                    row.identity()
                );
                warn!("{}", message);
                output.warnings.push(message);
            }
        }
        debug!(
            rank = row.installed_rank,
            migration = %row.identity(),
            action = %kind,
            "Liberated row"
        );
        output.actions.push(LiberateAction {
            kind,
            installed_rank: row.installed_rank,
            version: row.version.clone(),
            description: row.description.clone(),
            migration_type: row.migration_type,
        });
    }

    info!(
        from = %output.old_schema_history_table,
        to = %output.schema_history_table,
        copied = output.copied(),
        skipped = output.actions.len() - output.copied(),
        "Liberated schema history"
    );
    Ok(output)
}

//! Migration types: resolved units and ledger rows.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::script_checksum;
use crate::error::{MigrateResult, MigrationError};
use crate::executor::SqlRunner;
use crate::version::Version;

/// Kind of a migration unit or ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationType {
    /// Declarative script body.
    Script,
    /// Imperatively coded unit.
    Code,
    /// Script unit applied as a baseline initializer.
    ScriptBaseline,
    /// Code unit applied as a baseline initializer.
    CodeBaseline,
    /// Synthetic baseline marker.
    Baseline,
    /// Row marked deleted by repair, or a foreign deletion marker.
    #[serde(rename = "DELETE")]
    Deleted,
    /// Foreign undo of a script unit.
    UndoScript,
    /// Foreign undo of a code unit.
    UndoCode,
}

impl MigrationType {
    /// The tag stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "SCRIPT",
            Self::Code => "CODE",
            Self::ScriptBaseline => "SCRIPT_BASELINE",
            Self::CodeBaseline => "CODE_BASELINE",
            Self::Baseline => "BASELINE",
            Self::Deleted => "DELETE",
            Self::UndoScript => "UNDO_SCRIPT",
            Self::UndoCode => "UNDO_CODE",
        }
    }

    /// Baseline marker or baseline initializer.
    pub fn is_baseline(&self) -> bool {
        matches!(self, Self::Baseline | Self::ScriptBaseline | Self::CodeBaseline)
    }

    /// Undo event recorded by a foreign tool.
    pub fn is_undo(&self) -> bool {
        matches!(self, Self::UndoScript | Self::UndoCode)
    }

    /// Marker rows that never count as applied history.
    pub fn is_marker(&self) -> bool {
        self.is_undo() || *self == Self::Deleted
    }

    /// The baseline-initializer counterpart of an executable type.
    pub fn as_baseline(&self) -> Self {
        match self {
            Self::Script | Self::ScriptBaseline => Self::ScriptBaseline,
            Self::Code | Self::CodeBaseline => Self::CodeBaseline,
            other => *other,
        }
    }

    /// Whether two types refer to the same execution mechanism.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        let family = |t: &Self| match t {
            Self::Script | Self::ScriptBaseline | Self::UndoScript => 1,
            Self::Code | Self::CodeBaseline | Self::UndoCode => 2,
            Self::Baseline => 3,
            Self::Deleted => 4,
        };
        family(self) == family(other)
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SCRIPT" => Self::Script,
            "CODE" => Self::Code,
            "SCRIPT_BASELINE" => Self::ScriptBaseline,
            "CODE_BASELINE" => Self::CodeBaseline,
            "BASELINE" => Self::Baseline,
            "DELETE" => Self::Deleted,
            "UNDO_SCRIPT" => Self::UndoScript,
            "UNDO_CODE" => Self::UndoCode,
            other => return Err(MigrationError::UnknownMigrationType(other.to_string())),
        })
    }
}

/// Identity of a migration: `(version, description)` or a repeatable's description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MigrationIdentity {
    /// Versioned unit.
    Versioned(Version, String),
    /// Repeatable unit.
    Repeatable(String),
}

impl MigrationIdentity {
    /// Build an identity from an optional version and a description.
    pub fn new(version: Option<&Version>, description: &str) -> Self {
        match version {
            Some(v) => Self::Versioned(v.clone(), description.to_string()),
            None => Self::Repeatable(description.to_string()),
        }
    }

    /// The version, if any.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Versioned(v, _) => Some(v),
            Self::Repeatable(_) => None,
        }
    }
}

impl fmt::Display for MigrationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Versioned(v, d) => write!(f, "{} - {}", v, d),
            Self::Repeatable(d) => write!(f, "R - {}", d),
        }
    }
}

/// An imperatively coded migration unit.
#[async_trait::async_trait]
pub trait CodeMigration: Send + Sync {
    /// Run the unit against the database.
    async fn migrate(&self, runner: &dyn SqlRunner) -> MigrateResult<()>;

    /// Checksum reported for the unit, if it tracks one.
    fn checksum(&self) -> Option<i32> {
        None
    }
}

/// Executable body of a resolved migration.
#[derive(Clone)]
pub enum MigrationBody {
    /// SQL script.
    Script(String),
    /// Coded unit.
    Code(Arc<dyn CodeMigration>),
}

impl fmt::Debug for MigrationBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(sql) => f.debug_tuple("Script").field(sql).finish(),
            Self::Code(_) => f.write_str("Code(..)"),
        }
    }
}

/// A migration available for application, as supplied by discovery.
#[derive(Debug, Clone)]
pub struct ResolvedMigration {
    /// Version, `None` for repeatable units.
    pub version: Option<Version>,
    /// Description of what this migration does.
    pub description: String,
    /// Location or file name recorded in the ledger.
    pub script: String,
    /// Checksum of the unit's content.
    pub checksum: Option<i32>,
    /// Kind of the unit.
    pub migration_type: MigrationType,
    /// What gets executed.
    pub body: MigrationBody,
}

impl ResolvedMigration {
    /// Create a versioned script migration.
    pub fn versioned_script(
        version: Version,
        description: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        let description = description.into();
        let sql = sql.into();
        Self {
            script: format!("V{}__{}.sql", version, description.replace(' ', "_")),
            version: Some(version),
            description,
            checksum: Some(script_checksum(&sql)),
            migration_type: MigrationType::Script,
            body: MigrationBody::Script(sql),
        }
    }

    /// Create a repeatable script migration.
    pub fn repeatable_script(description: impl Into<String>, sql: impl Into<String>) -> Self {
        let description = description.into();
        let sql = sql.into();
        Self {
            script: format!("R__{}.sql", description.replace(' ', "_")),
            version: None,
            description,
            checksum: Some(script_checksum(&sql)),
            migration_type: MigrationType::Script,
            body: MigrationBody::Script(sql),
        }
    }

    /// Create a versioned code migration.
    pub fn versioned_code(
        version: Version,
        description: impl Into<String>,
        unit: Arc<dyn CodeMigration>,
    ) -> Self {
        let description = description.into();
        Self {
            script: format!("V{}__{}", version, description.replace(' ', "_")),
            version: Some(version),
            description,
            checksum: unit.checksum(),
            migration_type: MigrationType::Code,
            body: MigrationBody::Code(unit),
        }
    }

    /// Create a repeatable code migration.
    pub fn repeatable_code(description: impl Into<String>, unit: Arc<dyn CodeMigration>) -> Self {
        let description = description.into();
        Self {
            script: format!("R__{}", description.replace(' ', "_")),
            version: None,
            description,
            checksum: unit.checksum(),
            migration_type: MigrationType::Code,
            body: MigrationBody::Code(unit),
        }
    }

    /// Override the recorded script location.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Override the checksum.
    pub fn with_checksum(mut self, checksum: Option<i32>) -> Self {
        self.checksum = checksum;
        self
    }

    /// Check if this is a versioned unit.
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// Check if this is a repeatable unit.
    pub fn is_repeatable(&self) -> bool {
        self.version.is_none()
    }

    /// The identity used to match ledger rows.
    pub fn identity(&self) -> MigrationIdentity {
        MigrationIdentity::new(self.version.as_ref(), &self.description)
    }
}

/// A row of the migration ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Position in application order, assigned by the ledger store.
    pub installed_rank: i32,
    /// Version, `None` for repeatable units.
    pub version: Option<Version>,
    /// Description of the unit.
    pub description: String,
    /// Kind of the row.
    pub migration_type: MigrationType,
    /// Location or file name of the unit.
    pub script: String,
    /// Checksum recorded at application time.
    pub checksum: Option<i32>,
    /// Duration of the run in milliseconds.
    pub execution_time_ms: i64,
    /// Whether the run succeeded.
    pub success: bool,
    /// Who applied it.
    pub installed_by: String,
    /// When it was applied.
    pub installed_on: DateTime<Utc>,
}

impl AppliedMigration {
    /// Check if this is a versioned row.
    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// Check if this is a repeatable row.
    pub fn is_repeatable(&self) -> bool {
        self.version.is_none()
    }

    /// The identity used to match resolved units.
    pub fn identity(&self) -> MigrationIdentity {
        MigrationIdentity::new(self.version.as_ref(), &self.description)
    }

    /// Copy of the row content without its rank.
    pub fn to_new(&self) -> NewAppliedMigration {
        NewAppliedMigration {
            version: self.version.clone(),
            description: self.description.clone(),
            migration_type: self.migration_type,
            script: self.script.clone(),
            checksum: self.checksum,
            execution_time_ms: self.execution_time_ms,
            success: self.success,
            installed_by: self.installed_by.clone(),
            installed_on: self.installed_on,
        }
    }
}

/// A ledger row about to be appended; the store assigns the rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppliedMigration {
    /// Version, `None` for repeatable units.
    pub version: Option<Version>,
    /// Description of the unit.
    pub description: String,
    /// Kind of the row.
    pub migration_type: MigrationType,
    /// Location or file name of the unit.
    pub script: String,
    /// Checksum recorded at application time.
    pub checksum: Option<i32>,
    /// Duration of the run in milliseconds.
    pub execution_time_ms: i64,
    /// Whether the run succeeded.
    pub success: bool,
    /// Who applied it.
    pub installed_by: String,
    /// When it was applied.
    pub installed_on: DateTime<Utc>,
}

impl NewAppliedMigration {
    /// Row recording an execution of a resolved unit.
    pub fn executed(
        migration: &ResolvedMigration,
        installed_by: impl Into<String>,
        execution_time_ms: i64,
        success: bool,
    ) -> Self {
        Self {
            version: migration.version.clone(),
            description: migration.description.clone(),
            migration_type: migration.migration_type,
            script: migration.script.clone(),
            checksum: migration.checksum,
            execution_time_ms,
            success,
            installed_by: installed_by.into(),
            installed_on: Utc::now(),
        }
    }

    /// Attach the rank assigned by the store.
    pub fn into_applied(self, installed_rank: i32) -> AppliedMigration {
        AppliedMigration {
            installed_rank,
            version: self.version,
            description: self.description,
            migration_type: self.migration_type,
            script: self.script,
            checksum: self.checksum,
            execution_time_ms: self.execution_time_ms,
            success: self.success,
            installed_by: self.installed_by,
            installed_on: self.installed_on,
        }
    }
}

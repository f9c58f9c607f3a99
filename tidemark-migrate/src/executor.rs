//! Execution of migration bodies.
//!
//! The engine hands every unit to a [`MigrationExecutor`] and only looks at
//! whether it succeeded. [`BodyExecutor`] is the stock executor: scripts go to
//! a [`SqlRunner`], coded units run themselves against the same runner.

use crate::error::MigrateResult;
use crate::migration::{MigrationBody, ResolvedMigration};

/// Runs raw SQL against the live connection.
#[async_trait::async_trait]
pub trait SqlRunner: Send + Sync {
    /// Execute a script body.
    async fn execute_sql(&self, sql: &str) -> MigrateResult<()>;
}

/// Executes one resolved unit.
#[async_trait::async_trait]
pub trait MigrationExecutor: Send + Sync {
    /// Run the unit; any error marks the unit failed.
    async fn execute(&self, migration: &ResolvedMigration) -> MigrateResult<()>;
}

/// Executor dispatching on the body variant.
pub struct BodyExecutor<R: SqlRunner> {
    runner: R,
}

impl<R: SqlRunner> BodyExecutor<R> {
    /// Create an executor over a SQL runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// The underlying runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }
}

#[async_trait::async_trait]
impl<R: SqlRunner> MigrationExecutor for BodyExecutor<R> {
    async fn execute(&self, migration: &ResolvedMigration) -> MigrateResult<()> {
        match &migration.body {
            MigrationBody::Script(sql) => self.runner.execute_sql(sql).await,
            MigrationBody::Code(unit) => unit.migrate(&self.runner).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::MigrationError;
    use crate::migration::CodeMigration;

    #[derive(Default)]
    struct Recorder {
        statements: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SqlRunner for Recorder {
        async fn execute_sql(&self, sql: &str) -> MigrateResult<()> {
            if sql.contains("FAIL") {
                return Err(MigrationError::database("syntax error"));
            }
            self.statements.lock().push(sql.to_string());
            Ok(())
        }
    }

    struct SeedUsers;

    #[async_trait::async_trait]
    impl CodeMigration for SeedUsers {
        async fn migrate(&self, runner: &dyn SqlRunner) -> MigrateResult<()> {
            runner.execute_sql("INSERT INTO users VALUES (1);").await?;
            runner.execute_sql("INSERT INTO users VALUES (2);").await
        }
    }

    #[tokio::test]
    async fn test_script_body_runs_sql() {
        let executor = BodyExecutor::new(Recorder::default());
        let m = ResolvedMigration::versioned_script(
            "1".parse().unwrap(),
            "create users",
            "CREATE TABLE users (id INT);",
        );

        executor.execute(&m).await.unwrap();
        assert_eq!(
            *executor.runner().statements.lock(),
            vec!["CREATE TABLE users (id INT);".to_string()]
        );
    }

    #[tokio::test]
    async fn test_code_body_uses_runner() {
        let executor = BodyExecutor::new(Recorder::default());
        let m =
            ResolvedMigration::versioned_code("2".parse().unwrap(), "seed", Arc::new(SeedUsers));

        executor.execute(&m).await.unwrap();
        assert_eq!(executor.runner().statements.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let executor = BodyExecutor::new(Recorder::default());
        let m = ResolvedMigration::repeatable_script("broken", "FAIL");
        assert!(executor.execute(&m).await.is_err());
    }
}

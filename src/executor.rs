//! Statement execution with ordering and failure policy
//!
//! Serial mode awaits each statement before issuing the next one. Concurrent
//! mode issues every statement at once over the same runner and settles them
//! in completion order. Under the non-force policy the first failure ends the
//! run with an error; in concurrent mode the statements still outstanding at
//! that point are abandoned rather than drained.

use crate::{
    connection::StatementRunner,
    policy::{ExecutionMode, ExecutionPolicy, Verbosity},
    result::{Result, ScriptError},
    tokenizer::Statement,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;

/// A statement that failed while the force policy kept the run going
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    /// 1-based statement index
    pub index: usize,
    pub message: String,
}

/// Aggregate outcome of running one file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub file: String,
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed statements in source order
    pub failures: Vec<StatementFailure>,
    /// Error from the database switch issued before the first statement
    pub database_error: Option<String>,
}

impl ExecutionResult {
    pub fn new(file: impl Into<String>) -> Self {
        ExecutionResult {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.database_error.is_none()
    }
}

/// Runs tokenized statements against a [`StatementRunner`]
#[derive(Debug, Clone, Default)]
pub struct ScriptExecutor {
    policy: ExecutionPolicy,
}

impl ScriptExecutor {
    pub fn new(policy: ExecutionPolicy) -> Self {
        ScriptExecutor { policy }
    }

    pub fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Execute `statements` from `file`; the runner stays owned by the
    /// caller, who closes it once this returns.
    pub async fn execute(
        &self,
        file: &str,
        statements: &[Statement],
        conn: &dyn StatementRunner,
    ) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(file);
        if self.policy.verbosity >= Verbosity::Summary {
            tracing::info!(file = file, "Starting to process '{file}'");
        }

        if let Some(database) = &self.policy.database {
            self.select_database(database, conn, &mut result).await?;
        }

        match self.policy.mode {
            ExecutionMode::Serial => {
                self.execute_serial(file, statements, conn, &mut result)
                    .await?
            }
            ExecutionMode::Concurrent => {
                self.execute_concurrent(file, statements, conn, &mut result)
                    .await?
            }
        }
        result.failures.sort_by_key(|failure| failure.index);

        if self.policy.verbosity >= Verbosity::Summary {
            tracing::info!(
                file = file,
                attempted = result.attempted,
                succeeded = result.succeeded,
                "Executed {} commands from file '{}' ({} succeeded)",
                result.attempted,
                file,
                result.succeeded
            );
        }
        Ok(result)
    }

    async fn select_database(
        &self,
        database: &str,
        conn: &dyn StatementRunner,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let Some(sql) = conn.use_database_sql(database) else {
            tracing::warn!(
                backend = %conn.backend(),
                "backend cannot switch databases, ignoring `{database}`"
            );
            return Ok(());
        };

        let verbose = self.policy.verbosity >= Verbosity::Statements;
        if verbose {
            tracing::info!("Setting database to `{database}`......");
        }
        match conn.run_statement(&sql, self.policy.statement_timeout).await {
            Ok(()) => {
                if verbose {
                    tracing::info!("Done");
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!("USE DB Command failed :: {message}");
                if !self.policy.force {
                    return Err(ScriptError::UseDatabase {
                        database: database.to_string(),
                        message,
                    });
                }
                result.database_error = Some(message);
                Ok(())
            }
        }
    }

    async fn execute_serial(
        &self,
        file: &str,
        statements: &[Statement],
        conn: &dyn StatementRunner,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        for statement in statements {
            self.log_executing(file, statement);
            result.attempted += 1;
            let outcome = dispatch(conn, statement, self.policy.statement_timeout).await;
            self.settle(file, statement, outcome, result)?;
        }
        Ok(())
    }

    async fn execute_concurrent(
        &self,
        file: &str,
        statements: &[Statement],
        conn: &dyn StatementRunner,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let timeout = self.policy.statement_timeout;
        let mut pending: FuturesUnordered<_> = statements
            .iter()
            .map(|statement| {
                self.log_executing(file, statement);
                async move { (statement, dispatch(conn, statement, timeout).await) }
            })
            .collect();
        result.attempted += statements.len();

        // Returning early drops `pending`, abandoning unsettled statements
        while let Some((statement, outcome)) = pending.next().await {
            self.settle(file, statement, outcome, result)?;
        }
        Ok(())
    }

    fn log_executing(&self, file: &str, statement: &Statement) {
        if let Some(message) = executing_message(self.policy.verbosity, file, statement) {
            tracing::info!(file = file, index = statement.index, "{message}");
        }
    }

    fn settle(
        &self,
        file: &str,
        statement: &Statement,
        outcome: Result<()>,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        match outcome {
            Ok(()) => {
                result.succeeded += 1;
                if self.policy.verbosity >= Verbosity::Statements {
                    tracing::info!(
                        file = file,
                        index = statement.index,
                        "Successfully executed query #{}",
                        statement.index
                    );
                }
                Ok(())
            }
            Err(e) => {
                let failure = ScriptError::Statement {
                    file: file.to_string(),
                    index: statement.index,
                    message: e.to_string(),
                };
                tracing::error!(file = file, index = statement.index, "{failure}");
                if !self.policy.force {
                    return Err(failure);
                }
                if let ScriptError::Statement { index, message, .. } = failure {
                    result.failures.push(StatementFailure { index, message });
                }
                Ok(())
            }
        }
    }
}

/// Blank statements (from `;;`) count as executed but are never sent, since
/// servers such as MySQL reject an empty query.
async fn dispatch(
    conn: &dyn StatementRunner,
    statement: &Statement,
    timeout: Duration,
) -> Result<()> {
    if statement.sql.is_empty() {
        tracing::debug!(index = statement.index, "skipping blank statement");
        return Ok(());
    }
    conn.run_statement(&statement.sql, timeout).await
}

/// Run `statements` under `policy`, see [`ScriptExecutor::execute`]
pub async fn execute(
    file: &str,
    statements: &[Statement],
    conn: &dyn StatementRunner,
    policy: &ExecutionPolicy,
) -> Result<ExecutionResult> {
    ScriptExecutor::new(policy.clone())
        .execute(file, statements, conn)
        .await
}

/// The "executing" progress line for `statement`, if `verbosity` wants one
pub fn executing_message(verbosity: Verbosity, file: &str, statement: &Statement) -> Option<String> {
    if verbosity < Verbosity::Statements {
        return None;
    }
    let mut message = format!("Executing '{file}' query #{} ........ ", statement.index);
    if verbosity == Verbosity::Full {
        message.push_str(&statement.sql);
    }
    Some(message)
}

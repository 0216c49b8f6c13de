use crate::{
    config::{Backend, ProcessorConfig},
    result::{Result, ScriptError},
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "mysql")]
use crate::runner_mysql::MySqlRunner;
#[cfg(feature = "postgresql")]
use crate::runner_postgresql::PostgresRunner;
#[cfg(feature = "sqlite")]
use crate::runner_sqlite::SqliteRunner;

/// An open database session that accepts one SQL statement at a time.
///
/// Implementations take `&self` so that the executor can have several
/// statements outstanding in concurrent mode; multiplexing or serializing
/// them is up to the session.
#[async_trait]
pub trait StatementRunner: Send + Sync {
    fn backend(&self) -> Backend;

    /// Run one statement, failing with [`ScriptError::Timeout`] once
    /// `timeout` has elapsed. Result sets are discarded.
    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()>;

    /// Statement that switches the session to `database`, if the backend
    /// has such a thing
    fn use_database_sql(&self, database: &str) -> Option<String>;

    /// Release the session
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Bound a dispatch future by `timeout`
pub(crate) async fn with_timeout<T, F>(timeout: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| ScriptError::Timeout(timeout))?
}

/// Database connection enum that holds different database backends
pub enum DatabaseConnection {
    #[cfg(feature = "mysql")]
    MySql(MySqlRunner),
    #[cfg(feature = "postgresql")]
    PostgreSql(PostgresRunner),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteRunner),
}

impl DatabaseConnection {
    /// Open a session for the configured backend
    pub async fn connect(config: &ProcessorConfig) -> Result<Self> {
        match config.backend {
            #[cfg(feature = "mysql")]
            Backend::MySql => Ok(DatabaseConnection::MySql(
                MySqlRunner::connect(config).await?,
            )),
            #[cfg(feature = "postgresql")]
            Backend::PostgreSql => Ok(DatabaseConnection::PostgreSql(
                PostgresRunner::connect(config).await?,
            )),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => Ok(DatabaseConnection::Sqlite(SqliteRunner::connect(config)?)),
            #[allow(unreachable_patterns)]
            backend => Err(ScriptError::configuration(format!(
                "backend '{backend}' is not enabled in this build"
            ))),
        }
    }
}

#[async_trait]
impl StatementRunner for DatabaseConnection {
    fn backend(&self) -> Backend {
        match self {
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(runner) => runner.backend(),
            #[cfg(feature = "postgresql")]
            DatabaseConnection::PostgreSql(runner) => runner.backend(),
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite(runner) => runner.backend(),
        }
    }

    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()> {
        match self {
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(runner) => runner.run_statement(sql, timeout).await,
            #[cfg(feature = "postgresql")]
            DatabaseConnection::PostgreSql(runner) => runner.run_statement(sql, timeout).await,
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite(runner) => runner.run_statement(sql, timeout).await,
        }
    }

    fn use_database_sql(&self, database: &str) -> Option<String> {
        match self {
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(runner) => runner.use_database_sql(database),
            #[cfg(feature = "postgresql")]
            DatabaseConnection::PostgreSql(runner) => runner.use_database_sql(database),
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite(runner) => runner.use_database_sql(database),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        match *self {
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(runner) => Box::new(runner).close().await,
            #[cfg(feature = "postgresql")]
            DatabaseConnection::PostgreSql(runner) => Box::new(runner).close().await,
            #[cfg(feature = "sqlite")]
            DatabaseConnection::Sqlite(runner) => Box::new(runner).close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout(Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ScriptError::Timeout(d)) if d == Duration::from_millis(10)));
    }
}

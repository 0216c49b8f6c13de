use std::time::Duration;
use thiserror::Error;

/// Main error type for the SQL script runner
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgresql")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Missing or inconsistent settings, raised before any file is processed
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Connection error: {0}")]
    Connection(String),
    /// A statement failed server-side; `index` is 1-based
    #[error("Command#{index} in file '{file}' failed :: {message}")]
    Statement {
        file: String,
        index: usize,
        message: String,
    },
    #[error("USE DB Command failed for `{database}` :: {message}")]
    UseDatabase { database: String, message: String },
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),
}

impl ScriptError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ScriptError::Configuration(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        ScriptError::Connection(message.into())
    }

    /// Whether this error aborted a run under the non-force policy
    pub fn is_statement_failure(&self) -> bool {
        matches!(
            self,
            ScriptError::Statement { .. } | ScriptError::UseDatabase { .. }
        )
    }
}

/// Type alias for Results using ScriptError
pub type Result<T> = std::result::Result<T, ScriptError>;

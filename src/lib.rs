//! Split SQL script files into statements and run them against a database.
//!
//! [`tokenize`] turns script text into [`Statement`]s, honoring quotes,
//! comments and `DELIMITER` directives. [`ScriptExecutor`] runs them over a
//! [`StatementRunner`] under an [`ExecutionPolicy`], and [`ScriptProcessor`]
//! ties both to a per-file connection lifecycle.

#[cfg(not(any(feature = "mysql", feature = "postgresql", feature = "sqlite")))]
compile_error!("enable at least one of the `mysql`, `postgresql` or `sqlite` features");

pub mod config;
pub mod connection;
pub mod executor;
pub mod policy;
pub mod processor;
pub mod result;
#[cfg(feature = "mysql")]
pub mod runner_mysql;
#[cfg(feature = "postgresql")]
pub mod runner_postgresql;
#[cfg(feature = "sqlite")]
pub mod runner_sqlite;
pub mod tokenizer;

// Re-export types for convenience
pub use config::{Backend, ProcessorConfig};
pub use connection::{DatabaseConnection, StatementRunner};
pub use executor::{ExecutionResult, ScriptExecutor, StatementFailure, execute};
pub use policy::{DEFAULT_STATEMENT_TIMEOUT, ExecutionMode, ExecutionPolicy, Verbosity};
pub use processor::{ConnectionProvider, DatabaseProvider, ScriptProcessor};
pub use result::{Result, ScriptError};
pub use tokenizer::{DEFAULT_DELIMITER, ScriptBuffer, Statement, render_script, tokenize};

#[cfg(feature = "mysql")]
pub use runner_mysql::MySqlRunner;
#[cfg(feature = "postgresql")]
pub use runner_postgresql::PostgresRunner;
#[cfg(feature = "sqlite")]
pub use runner_sqlite::SqliteRunner;

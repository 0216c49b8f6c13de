use crate::{
    config::{Backend, ProcessorConfig},
    connection::StatementRunner,
    result::{Result, ScriptError},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// SQLite session; statements run on the blocking thread pool.
///
/// Statements take turns on `turn`, so the time bound of each one starts
/// only once it owns the connection. A statement that times out or whose
/// future is dropped is interrupted, and one that never started is skipped.
pub struct SqliteRunner {
    conn: Arc<Mutex<Connection>>,
    interrupt: InterruptHandle,
    turn: tokio::sync::Mutex<()>,
}

impl SqliteRunner {
    /// Open the database file named by `config.database`
    pub fn connect(config: &ProcessorConfig) -> Result<Self> {
        let path = config
            .database
            .as_deref()
            .ok_or_else(|| ScriptError::configuration("sqlite backend needs a database file path"))?;
        tracing::debug!(path = path, "opening SQLite database");
        let conn = Connection::open(path)
            .map_err(|e| ScriptError::connection(format!("Failed to open SQLite database: {e}")))?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteRunner {
            interrupt: conn.get_interrupt_handle(),
            conn: Arc::new(Mutex::new(conn)),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    /// Run `f` against the underlying connection, e.g. to inspect results
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        f(&self.conn.lock())
    }
}

/// Run one statement, discarding any rows it returns
fn run_blocking(conn: &Connection, sql: &str) -> rusqlite::Result<()> {
    match conn.execute_batch(sql) {
        // Raised after the first step has run; the statement still took effect
        Err(rusqlite::Error::ExecuteReturnedResults) => Ok(()),
        other => other,
    }
}

/// Stops the blocking work of a dispatch unless disarmed
struct CancelGuard<'a> {
    cancelled: Arc<AtomicBool>,
    interrupt: &'a InterruptHandle,
    armed: bool,
}

impl CancelGuard<'_> {
    fn cancel(&mut self) {
        self.armed = false;
        self.cancelled.store(true, Ordering::SeqCst);
        self.interrupt.interrupt();
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cancel();
        }
    }
}

#[async_trait]
impl StatementRunner for SqliteRunner {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()> {
        let _turn = self.turn.lock().await;

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut guard = CancelGuard {
            cancelled: Arc::clone(&cancelled),
            interrupt: &self.interrupt,
            armed: true,
        };
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        // `None` means the statement was cancelled before it started
        let mut task = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            if cancelled.load(Ordering::SeqCst) {
                return None;
            }
            Some(run_blocking(&conn, &sql))
        });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(joined) => {
                guard.armed = false;
                match joined? {
                    Some(outcome) => Ok(outcome?),
                    None => Err(ScriptError::Timeout(timeout)),
                }
            }
            Err(_) => {
                guard.cancel();
                // Wait for the interrupted statement so it cannot land later
                match task.await? {
                    Some(Ok(())) => {
                        tracing::warn!("SQLite statement finished despite exceeding {timeout:?}");
                        Ok(())
                    }
                    _ => Err(ScriptError::Timeout(timeout)),
                }
            }
        }
    }

    fn use_database_sql(&self, _database: &str) -> Option<String> {
        None
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!("closing SQLite database");
        let SqliteRunner { conn, .. } = *self;
        match Arc::try_unwrap(conn) {
            Ok(mutex) => mutex.into_inner().close().map_err(|(_, e)| e.into()),
            // An abandoned statement still holds a reference; it closes on drop
            Err(_) => {
                tracing::warn!("SQLite connection still in use by an abandoned statement");
                Ok(())
            }
        }
    }
}

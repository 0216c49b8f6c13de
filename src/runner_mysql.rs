//! MySQL / MariaDB backend

use crate::{
    config::{Backend, ProcessorConfig},
    connection::{StatementRunner, with_timeout},
    result::{Result, ScriptError},
};
use async_trait::async_trait;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts, prelude::Queryable};
use std::time::Duration;
use tokio::sync::Mutex;

/// A single MySQL session.
///
/// The protocol allows one command in flight per session, so statements
/// issued concurrently queue on the mutex in arrival order.
pub struct MySqlRunner {
    conn: Mutex<Conn>,
}

impl MySqlRunner {
    pub async fn connect(config: &ProcessorConfig) -> Result<Self> {
        let host = config.host().to_string();
        let port = config
            .port()
            .unwrap_or(crate::config::DEFAULT_MYSQL_PORT);
        tracing::debug!(host = %host, port = port, database = ?config.database, "connecting to MySQL");

        let mut builder = OptsBuilder::from_opts(Opts::default())
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(config.username.clone())
            .pass(config.password.clone())
            .db_name(config.database.clone());
        if config.secure {
            builder = builder.ssl_opts(Some(SslOpts::default()));
        }

        let conn = Conn::new(builder)
            .await
            .map_err(|e| ScriptError::connection(format!("Failed to connect to MySQL: {e}")))?;
        tracing::debug!(connection_id = conn.id(), "MySQL connection established");
        Ok(MySqlRunner {
            conn: Mutex::new(conn),
        })
    }

    pub fn from_conn(conn: Conn) -> Self {
        MySqlRunner {
            conn: Mutex::new(conn),
        }
    }
}

/// `USE` statement with the name quoted as an identifier
pub fn use_database_statement(database: &str) -> String {
    format!("USE `{}`", database.replace('`', "``"))
}

#[async_trait]
impl StatementRunner for MySqlRunner {
    fn backend(&self) -> Backend {
        Backend::MySql
    }

    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()> {
        // Queue time on the session does not count against the bound
        let mut conn = self.conn.lock().await;
        with_timeout(timeout, async {
            conn.query_drop(sql).await?;
            Ok(())
        })
        .await
    }

    fn use_database_sql(&self, database: &str) -> Option<String> {
        Some(use_database_statement(database))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!("closing MySQL connection");
        self.conn.into_inner().disconnect().await?;
        Ok(())
    }
}

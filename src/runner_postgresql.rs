//! PostgreSQL backend

use crate::{
    config::{Backend, DEFAULT_POSTGRES_PORT, ProcessorConfig},
    connection::{StatementRunner, with_timeout},
    result::{Result, ScriptError},
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, Connection, NoTls, Socket, tls::NoTlsStream};

/// A PostgreSQL client plus the task driving its connection.
///
/// The server answers pipelined requests in order, so statements take turns
/// and each time bound starts only when the statement is sent.
pub struct PostgresRunner {
    client: Client,
    connection_task: JoinHandle<()>,
    turn: Mutex<()>,
}

impl PostgresRunner {
    pub async fn connect(config: &ProcessorConfig) -> Result<Self> {
        if config.secure {
            return Err(ScriptError::configuration(
                "secure connections are not supported for the postgresql backend",
            ));
        }

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(config.host())
            .port(config.port().unwrap_or(DEFAULT_POSTGRES_PORT));
        if let Some(user) = &config.username {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password);
        }
        if let Some(database) = &config.database {
            pg_config.dbname(database);
        }

        tracing::debug!(host = config.host(), database = ?config.database, "connecting to PostgreSQL");
        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            ScriptError::connection(format!("Failed to connect to PostgreSQL: {e}"))
        })?;
        Ok(Self::from_parts(client, connection))
    }

    /// Connect using a libpq-style connection string
    pub async fn connect_str(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| {
                ScriptError::connection(format!("Failed to connect to PostgreSQL: {e}"))
            })?;
        Ok(Self::from_parts(client, connection))
    }

    fn from_parts(client: Client, connection: Connection<Socket, NoTlsStream>) -> Self {
        // Run the connection in the background
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });
        PostgresRunner {
            client,
            connection_task,
            turn: Mutex::new(()),
        }
    }
}

/// PostgreSQL cannot switch databases within a session; the closest
/// equivalent is making the schema of that name the default.
pub fn search_path_statement(schema: &str) -> String {
    format!("SET search_path TO \"{}\"", schema.replace('"', "\"\""))
}

#[async_trait]
impl StatementRunner for PostgresRunner {
    fn backend(&self) -> Backend {
        Backend::PostgreSql
    }

    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()> {
        let _turn = self.turn.lock().await;
        let outcome = with_timeout(timeout, async {
            self.client.batch_execute(sql).await?;
            Ok(())
        })
        .await;
        if matches!(outcome, Err(ScriptError::Timeout(_))) {
            // Dropping the request does not stop it server-side
            if let Err(e) = self.client.cancel_token().cancel_query(NoTls).await {
                tracing::warn!(error = %e, "failed to cancel timed-out PostgreSQL statement");
            }
        }
        outcome
    }

    fn use_database_sql(&self, database: &str) -> Option<String> {
        Some(search_path_statement(database))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        tracing::debug!("closing PostgreSQL connection");
        let PostgresRunner {
            client,
            connection_task,
            ..
        } = *self;
        // Dropping the client ends the connection future
        drop(client);
        connection_task.await?;
        Ok(())
    }
}

//! PostgreSQL integration tests
//!
//! Tests are only run when POSTGRES_CONNECTION_STRING environment variable is set.

use sqlscriptrunner::{
    ExecutionPolicy, PostgresRunner, ScriptError, ScriptExecutor, StatementRunner, tokenize,
};
use tokio_postgres::NoTls;

// Helper function to get PostgreSQL connection string from environment
fn get_postgres_connection_string() -> Option<String> {
    std::env::var("POSTGRES_CONNECTION_STRING").ok()
}

async fn query_count(connection_string: &str, sql: &str) -> i64 {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
        .await
        .unwrap();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {e}");
        }
    });
    client.query_one(sql, &[]).await.unwrap().get(0)
}

#[tokio::test]
async fn test_function_body_with_custom_delimiter() {
    let Some(connection_string) = get_postgres_connection_string() else {
        eprintln!("Skipping PostgreSQL test: POSTGRES_CONNECTION_STRING not set");
        return;
    };
    let runner = PostgresRunner::connect_str(&connection_string).await.unwrap();

    let script = "\
DROP TABLE IF EXISTS script_counter;
CREATE TABLE script_counter (n INTEGER NOT NULL);
DELIMITER //
CREATE OR REPLACE FUNCTION bump_counter(step INTEGER) RETURNS VOID AS $fn$
BEGIN
  INSERT INTO script_counter VALUES (step);
  INSERT INTO script_counter VALUES (step * 10);
END;
$fn$ LANGUAGE plpgsql//
DELIMITER ;
SELECT bump_counter(2);
SELECT 'text; with semicolon';
";
    let statements = tokenize(script, ";");
    assert_eq!(statements.len(), 5);

    let result = ScriptExecutor::new(ExecutionPolicy::serial())
        .execute("counter.sql", &statements, &runner)
        .await
        .unwrap();
    assert!(result.all_succeeded(), "failures: {:?}", result.failures);
    Box::new(runner).close().await.unwrap();

    let total = query_count(&connection_string, "SELECT SUM(n)::BIGINT FROM script_counter").await;
    assert_eq!(total, 22);
}

#[tokio::test]
async fn test_failure_aborts_serial_run() {
    let Some(connection_string) = get_postgres_connection_string() else {
        eprintln!("Skipping PostgreSQL test: POSTGRES_CONNECTION_STRING not set");
        return;
    };
    let runner = PostgresRunner::connect_str(&connection_string).await.unwrap();

    let statements = tokenize(
        "DROP TABLE IF EXISTS script_abort;\nCREATE TABLE script_abort (id INTEGER);\nINSERT INTO script_abort_missing VALUES (1);\nINSERT INTO script_abort VALUES (1);",
        ";",
    );
    let err = ScriptExecutor::new(ExecutionPolicy::serial().with_force(false))
        .execute("abort.sql", &statements, &runner)
        .await
        .unwrap_err();
    assert!(matches!(err, ScriptError::Statement { index: 3, .. }));
    Box::new(runner).close().await.unwrap();

    let rows = query_count(&connection_string, "SELECT COUNT(*) FROM script_abort").await;
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_search_path_switch() {
    let Some(connection_string) = get_postgres_connection_string() else {
        eprintln!("Skipping PostgreSQL test: POSTGRES_CONNECTION_STRING not set");
        return;
    };
    let setup = PostgresRunner::connect_str(&connection_string).await.unwrap();
    setup
        .run_statement(
            "CREATE SCHEMA IF NOT EXISTS script_runner_schema; DROP TABLE IF EXISTS script_runner_schema.marker",
            std::time::Duration::from_secs(10),
        )
        .await
        .unwrap();
    Box::new(setup).close().await.unwrap();

    let runner = PostgresRunner::connect_str(&connection_string).await.unwrap();
    let statements = tokenize("CREATE TABLE marker (id INTEGER);", ";");
    let policy = ExecutionPolicy::serial()
        .with_force(false)
        .with_database("script_runner_schema");
    ScriptExecutor::new(policy)
        .execute("schema.sql", &statements, &runner)
        .await
        .unwrap();
    Box::new(runner).close().await.unwrap();

    let tables = query_count(
        &connection_string,
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'script_runner_schema' AND table_name = 'marker'",
    )
    .await;
    assert_eq!(tables, 1);
}

//! MySQL integration tests
//!
//! Tests are only run when MYSQL_TEST_USER, MYSQL_TEST_PASSWORD and
//! MYSQL_TEST_DATABASE are set. MYSQL_TEST_HOST and MYSQL_TEST_PORT are
//! optional.

use mysql_async::prelude::Queryable;
use sqlscriptrunner::{Backend, ProcessorConfig, ScriptBuffer, ScriptError, ScriptProcessor};

fn mysql_test_config() -> Option<ProcessorConfig> {
    let username = std::env::var("MYSQL_TEST_USER").ok()?;
    let password = std::env::var("MYSQL_TEST_PASSWORD").ok()?;
    let database = std::env::var("MYSQL_TEST_DATABASE").ok()?;
    let mut config = ProcessorConfig {
        backend: Backend::MySql,
        username: Some(username),
        password: Some(password),
        database: Some(database),
        serial: true,
        ..ProcessorConfig::default()
    };
    if let Ok(host) = std::env::var("MYSQL_TEST_HOST") {
        config.host = host;
    }
    config.port = std::env::var("MYSQL_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok());
    Some(config)
}

async fn query_count(config: &ProcessorConfig, sql: &str) -> i64 {
    let opts = mysql_async::OptsBuilder::default()
        .ip_or_hostname(config.host().to_string())
        .tcp_port(config.port().unwrap_or(3306))
        .user(config.username.clone())
        .pass(config.password.clone())
        .db_name(config.database.clone());
    let mut conn = mysql_async::Conn::new(opts).await.unwrap();
    let count: Option<i64> = conn.query_first(sql).await.unwrap();
    conn.disconnect().await.unwrap();
    count.unwrap_or_default()
}

#[tokio::test]
async fn test_procedure_script() {
    let Some(config) = mysql_test_config() else {
        eprintln!("Skipping MySQL test: MYSQL_TEST_* variables not set");
        return;
    };
    let processor = ScriptProcessor::from_config(config.clone()).unwrap();

    let script = ScriptBuffer::new(
        "procedure.sql",
        "\
DROP TABLE IF EXISTS script_totals;
CREATE TABLE script_totals (n INT NOT NULL);
DROP PROCEDURE IF EXISTS script_fill;
DELIMITER //
CREATE PROCEDURE script_fill()
BEGIN
  INSERT INTO script_totals VALUES (1);
  INSERT INTO script_totals VALUES (2);
END //
DELIMITER ;
CALL script_fill(); # fill it
INSERT INTO script_totals VALUES (3); -- and one more
",
    );
    let result = processor.process(&script).await.unwrap();
    assert_eq!(result.attempted, 6);
    assert!(result.all_succeeded(), "failures: {:?}", result.failures);

    let total = query_count(&config, "SELECT CAST(SUM(n) AS SIGNED) FROM script_totals").await;
    assert_eq!(total, 6);
}

#[tokio::test]
async fn test_set_db_switches_database() {
    let Some(config) = mysql_test_config() else {
        eprintln!("Skipping MySQL test: MYSQL_TEST_* variables not set");
        return;
    };
    let config = ProcessorConfig {
        set_db: true,
        force: false,
        ..config
    };
    let processor = ScriptProcessor::from_config(config.clone()).unwrap();

    let result = processor
        .process(&ScriptBuffer::new(
            "switch.sql",
            "SELECT DATABASE(); SELECT 'a;b';",
        ))
        .await
        .unwrap();
    assert_eq!(result.succeeded, 2);
    assert_eq!(result.database_error, None);
}

#[tokio::test]
async fn test_failure_aborts_without_force() {
    let Some(config) = mysql_test_config() else {
        eprintln!("Skipping MySQL test: MYSQL_TEST_* variables not set");
        return;
    };
    let config = ProcessorConfig {
        force: false,
        ..config
    };
    let processor = ScriptProcessor::from_config(config.clone()).unwrap();

    let err = processor
        .process(&ScriptBuffer::new(
            "abort.sql",
            "DROP TABLE IF EXISTS script_abort;\nCREATE TABLE script_abort (id INT);\nINSERT INTO script_abort_missing VALUES (1);\nINSERT INTO script_abort VALUES (1);",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ScriptError::Statement { index: 3, .. }));

    let rows = query_count(&config, "SELECT COUNT(*) FROM script_abort").await;
    assert_eq!(rows, 0);
}

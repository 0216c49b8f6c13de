//! In-memory statement runner used by the executor and processor tests.
//!
//! Statement text drives the behavior:
//! - anything containing `FAIL` fails
//! - a leading `SLEEP <ms>` waits that long before succeeding

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlscriptrunner::{
    Backend, ConnectionProvider, ProcessorConfig, Result, ScriptError, StatementRunner,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MockState {
    issued: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    timeouts: Mutex<Vec<Duration>>,
    closes: AtomicUsize,
    connects: AtomicUsize,
}

impl MockState {
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().clone()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

pub struct MockRunner {
    state: Arc<MockState>,
    backend: Backend,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::with_state(Arc::new(MockState::default()), Backend::MySql)
    }

    pub fn with_backend(backend: Backend) -> Self {
        Self::with_state(Arc::new(MockState::default()), backend)
    }

    pub fn with_state(state: Arc<MockState>, backend: Backend) -> Self {
        MockRunner { state, backend }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

fn sleep_millis(sql: &str) -> Option<u64> {
    let rest = sql.strip_prefix("SLEEP ")?;
    rest.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl StatementRunner for MockRunner {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn run_statement(&self, sql: &str, timeout: Duration) -> Result<()> {
        self.state.issued.lock().push(sql.to_string());
        self.state.timeouts.lock().push(timeout);

        let work = async {
            if let Some(ms) = sleep_millis(sql) {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if sql.contains("FAIL") {
                return Err(ScriptError::connection(format!("mock rejected `{sql}`")));
            }
            Ok(())
        };
        let outcome = tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| ScriptError::Timeout(timeout))?;
        self.state.completed.lock().push(sql.to_string());
        outcome
    }

    fn use_database_sql(&self, database: &str) -> Option<String> {
        match self.backend {
            Backend::Sqlite => None,
            _ => Some(format!("USE `{database}`")),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out mock runners that all share one [`MockState`]
pub struct MockProvider {
    state: Arc<MockState>,
    refuse: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        MockProvider {
            state: Arc::new(MockState::default()),
            refuse: false,
        }
    }

    /// A provider whose connection attempts all fail
    pub fn refusing() -> Self {
        MockProvider {
            refuse: true,
            ..Self::new()
        }
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn connect(&self, config: &ProcessorConfig) -> Result<Box<dyn StatementRunner>> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(ScriptError::connection(format!(
                "connection refused by {}",
                config.host()
            )));
        }
        Ok(Box::new(MockRunner::with_state(
            Arc::clone(&self.state),
            config.backend,
        )))
    }
}

/// Credentials good enough to pass validation for the mock backends
pub fn mock_config() -> ProcessorConfig {
    ProcessorConfig {
        username: Some("builder".to_string()),
        password: Some("secret".to_string()),
        ..ProcessorConfig::default()
    }
}

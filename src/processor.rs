use crate::{
    config::ProcessorConfig,
    connection::{DatabaseConnection, StatementRunner},
    executor::{ExecutionResult, ScriptExecutor},
    result::Result,
    tokenizer::ScriptBuffer,
};
use async_trait::async_trait;

/// Source of database sessions, one per processed file
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connect(&self, config: &ProcessorConfig) -> Result<Box<dyn StatementRunner>>;
}

/// Opens real connections for the configured backend
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabaseProvider;

#[async_trait]
impl ConnectionProvider for DatabaseProvider {
    async fn connect(&self, config: &ProcessorConfig) -> Result<Box<dyn StatementRunner>> {
        Ok(Box::new(DatabaseConnection::connect(config).await?))
    }
}

/// Tokenizes and runs script files, one connection per file
pub struct ScriptProcessor<P = DatabaseProvider> {
    config: ProcessorConfig,
    executor: ScriptExecutor,
    provider: P,
}

impl ScriptProcessor<DatabaseProvider> {
    pub fn from_config(config: ProcessorConfig) -> Result<Self> {
        Self::new(config, DatabaseProvider)
    }
}

impl<P: ConnectionProvider> ScriptProcessor<P> {
    /// Validates `config`; configuration errors surface here, before any
    /// file is touched.
    pub fn new(config: ProcessorConfig, provider: P) -> Result<Self> {
        config.validate()?;
        let executor = ScriptExecutor::new(config.policy());
        Ok(ScriptProcessor {
            config,
            executor,
            provider,
        })
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Run one script. The connection is closed whether or not the run
    /// was aborted; an abort error takes precedence over a close error.
    pub async fn process(&self, script: &ScriptBuffer) -> Result<ExecutionResult> {
        let statements = script.statements();
        tracing::debug!(
            file = script.name(),
            statements = statements.len(),
            "tokenized script"
        );

        let conn = self.provider.connect(&self.config).await?;
        let outcome = self
            .executor
            .execute(script.name(), &statements, conn.as_ref())
            .await;
        let closed = conn.close().await;

        let result = outcome?;
        closed?;
        Ok(result)
    }

    /// Run scripts in order, stopping the whole run at the first error
    pub async fn process_all<I>(&self, scripts: I) -> Result<Vec<ExecutionResult>>
    where
        I: IntoIterator<Item = ScriptBuffer>,
    {
        let mut results = Vec::new();
        for script in scripts {
            results.push(self.process(&script).await?);
        }
        Ok(results)
    }
}

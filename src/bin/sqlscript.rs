//! Run SQL script files against a database, one connection per file.

use anyhow::Context;
use clap::Parser;
use sqlscriptrunner::{Backend, ProcessorConfig, ScriptBuffer, ScriptProcessor, Verbosity};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sqlscript", version, about = "Run SQL script files against a database")]
struct Cli {
    /// Script files, processed in the given order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON configuration file; flags and environment override its values
    #[arg(long, env = "SQLSCRIPT_CONFIG")]
    config: Option<PathBuf>,

    /// mysql, postgresql or sqlite
    #[arg(long, env = "SQLSCRIPT_BACKEND")]
    backend: Option<Backend>,

    #[arg(short, long, env = "SQLSCRIPT_USER")]
    user: Option<String>,

    #[arg(short, long, env = "SQLSCRIPT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "SQLSCRIPT_HOST")]
    host: Option<String>,

    #[arg(long, env = "SQLSCRIPT_PORT")]
    port: Option<u16>,

    /// Database name, or the database file for sqlite
    #[arg(short, long, env = "SQLSCRIPT_DATABASE")]
    database: Option<String>,

    /// 0-3 or NONE, LOW, MED, FULL
    #[arg(short, long, env = "SQLSCRIPT_VERBOSITY")]
    verbosity: Option<Verbosity>,

    /// Abort the whole run at the first failing statement
    #[arg(long, env = "SQLSCRIPT_NO_FORCE")]
    no_force: bool,

    /// Run statements one at a time instead of all at once
    #[arg(long, env = "SQLSCRIPT_SERIAL")]
    serial: bool,

    /// Switch to --database before running each file
    #[arg(long, env = "SQLSCRIPT_SET_DB")]
    set_db: bool,

    #[arg(long, env = "SQLSCRIPT_SECURE")]
    secure: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(ProcessorConfig, Vec<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => {
                let path = path.to_string_lossy();
                ProcessorConfig::from_file(&path)
                    .with_context(|| format!("failed to load configuration from {path}"))?
            }
            None => ProcessorConfig::default(),
        };

        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.user.is_some() {
            config.username = self.user;
        }
        if self.password.is_some() {
            config.password = self.password;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if self.port.is_some() {
            config.port = self.port;
        }
        if self.database.is_some() {
            config.database = self.database;
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }
        config.force = config.force && !self.no_force;
        config.serial |= self.serial;
        config.set_db |= self.set_db;
        config.secure |= self.secure;
        Ok((config, self.files))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let (config, files) = Cli::parse().into_config()?;
    let processor = ScriptProcessor::from_config(config)?;

    let mut scripts = Vec::with_capacity(files.len());
    for path in &files {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        scripts.push(ScriptBuffer::from_bytes(path.display().to_string(), &bytes));
    }

    let results = processor.process_all(scripts).await?;
    let failed: usize = results.iter().map(|r| r.failed()).sum();
    if failed > 0 {
        tracing::warn!(failed = failed, "some statements failed");
    }
    Ok(())
}

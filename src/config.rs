use crate::{
    policy::{ExecutionMode, ExecutionPolicy, Verbosity},
    result::{Result, ScriptError},
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Database backend a script is run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "postgres")]
    PostgreSql,
    Sqlite,
}

impl Backend {
    pub fn default_port(self) -> Option<u16> {
        match self {
            Backend::MySql => Some(DEFAULT_MYSQL_PORT),
            Backend::PostgreSql => Some(DEFAULT_POSTGRES_PORT),
            Backend::Sqlite => None,
        }
    }

    /// Network backends authenticate with username and password
    pub fn requires_credentials(self) -> bool {
        !matches!(self, Backend::Sqlite)
    }

    /// Whether support for this backend was compiled in
    pub fn is_enabled(self) -> bool {
        match self {
            Backend::MySql => cfg!(feature = "mysql"),
            Backend::PostgreSql => cfg!(feature = "postgresql"),
            Backend::Sqlite => cfg!(feature = "sqlite"),
        }
    }
}

impl FromStr for Backend {
    type Err = ScriptError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Backend::MySql),
            "postgresql" | "postgres" => Ok(Backend::PostgreSql),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(ScriptError::configuration(format!(
                "unknown backend '{s}', expected mysql, postgresql or sqlite"
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Backend::MySql => "mysql",
            Backend::PostgreSql => "postgresql",
            Backend::Sqlite => "sqlite",
        };
        write!(f, "{s}")
    }
}

/// Settings consumed by the script processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub backend: Backend,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: String,
    /// Falls back to the backend's default port when unset
    pub port: Option<u16>,
    /// Database to connect to; the file path for SQLite
    pub database: Option<String>,
    pub verbosity: Verbosity,
    pub force: bool,
    pub serial: bool,
    /// Issue a database switch to `database` before each file
    pub set_db: bool,
    pub secure: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            backend: Backend::MySql,
            username: None,
            password: None,
            host: DEFAULT_HOST.to_string(),
            port: None,
            database: None,
            verbosity: Verbosity::Summary,
            force: true,
            serial: false,
            set_db: false,
            secure: false,
        }
    }
}

impl ProcessorConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        Self::from_json(json)
    }

    /// Load a configuration from a serde_json::Value object
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        if !json.is_object() {
            return Err(ScriptError::configuration(format!(
                "configuration must be a JSON object, got {json}"
            )));
        }
        serde_json::from_value(json).map_err(|e| ScriptError::configuration(e.to_string()))
    }

    /// Effective port: the configured one or the backend default
    pub fn port(&self) -> Option<u16> {
        self.port.or(self.backend.default_port())
    }

    pub fn host(&self) -> &str {
        if self.host.trim().is_empty() {
            DEFAULT_HOST
        } else {
            &self.host
        }
    }

    /// Check that the configuration can drive a run at all
    pub fn validate(&self) -> Result<()> {
        if !self.backend.is_enabled() {
            return Err(ScriptError::configuration(format!(
                "backend '{}' is not enabled in this build",
                self.backend
            )));
        }

        if self.backend.requires_credentials() {
            let username = self.username.as_deref().unwrap_or_default();
            let password = self.password.as_deref().unwrap_or_default();
            if username.is_empty() || password.is_empty() {
                return Err(ScriptError::configuration(
                    "Both database username and password must be defined",
                ));
            }
        }

        let has_database = self
            .database
            .as_deref()
            .is_some_and(|db| !db.trim().is_empty());
        if self.backend == Backend::Sqlite && !has_database {
            return Err(ScriptError::configuration(
                "sqlite backend needs a database file path",
            ));
        }
        if self.set_db && !has_database {
            return Err(ScriptError::configuration(
                "set_db requires a database name",
            ));
        }
        Ok(())
    }

    /// Execution policy derived from these settings
    pub fn policy(&self) -> ExecutionPolicy {
        let mode = if self.serial {
            ExecutionMode::Serial
        } else {
            ExecutionMode::Concurrent
        };
        let policy = ExecutionPolicy::new()
            .with_mode(mode)
            .with_force(self.force)
            .with_verbosity(self.verbosity);
        match (&self.database, self.set_db) {
            (Some(database), true) => policy.with_database(database.clone()),
            _ => policy,
        }
    }
}

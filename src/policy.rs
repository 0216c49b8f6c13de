use crate::result::{Result, ScriptError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Time bound attached to every statement dispatch
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// How much progress the executor reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "VerbosityRepr", into = "u8")]
pub enum Verbosity {
    /// No progress output
    None = 0,
    /// Start and end of each file
    #[default]
    Summary = 1,
    /// Adds one line per executed and succeeded statement
    Statements = 2,
    /// Adds the statement text to each "executing" line
    Full = 3,
}

impl Verbosity {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Result<Self> {
        match level {
            0 => Ok(Verbosity::None),
            1 => Ok(Verbosity::Summary),
            2 => Ok(Verbosity::Statements),
            3 => Ok(Verbosity::Full),
            _ => Err(ScriptError::configuration(format!(
                "verbosity must be between 0 and 3, got {level}"
            ))),
        }
    }
}

impl FromStr for Verbosity {
    type Err = ScriptError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(level) = trimmed.parse::<u8>() {
            return Verbosity::from_level(level);
        }
        match trimmed.to_uppercase().as_str() {
            "NONE" | "N" => Ok(Verbosity::None),
            "LOW" | "L" => Ok(Verbosity::Summary),
            "MED" | "MEDIUM" | "M" => Ok(Verbosity::Statements),
            "FULL" | "F" => Ok(Verbosity::Full),
            _ => Err(ScriptError::configuration(format!(
                "unknown verbosity '{s}', expected 0-3, NONE, LOW, MED or FULL"
            ))),
        }
    }
}

impl From<Verbosity> for u8 {
    fn from(verbosity: Verbosity) -> Self {
        verbosity.level()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VerbosityRepr {
    Level(u8),
    Name(String),
}

impl TryFrom<VerbosityRepr> for Verbosity {
    type Error = ScriptError;

    fn try_from(repr: VerbosityRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            VerbosityRepr::Level(level) => Verbosity::from_level(level),
            VerbosityRepr::Name(name) => name.parse(),
        }
    }
}

/// Scheduling mode for the statements of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One statement at a time, each awaited before the next is issued
    Serial,
    /// All statements issued at once, completion order unspecified
    #[default]
    Concurrent,
}

/// Ordering and failure policy applied by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Keep going after a failed statement instead of aborting the run
    pub force: bool,
    pub mode: ExecutionMode,
    /// Database selected before the first statement, if any
    pub database: Option<String>,
    pub verbosity: Verbosity,
    pub statement_timeout: Duration,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy {
            force: true,
            mode: ExecutionMode::Concurrent,
            database: None,
            verbosity: Verbosity::Summary,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }
}

impl ExecutionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial() -> Self {
        Self::default().with_mode(ExecutionMode::Serial)
    }

    pub fn concurrent() -> Self {
        Self::default().with_mode(ExecutionMode::Concurrent)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Select `database` before running the script; blank names are ignored
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.trim().is_empty()).then_some(database);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn is_serial(&self) -> bool {
        self.mode == ExecutionMode::Serial
    }
}

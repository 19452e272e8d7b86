mod database;
mod election;
mod lock;

pub use database::DatabaseConfig;
pub use election::ElectionConfig;
pub use lock::{LockBackend, LockConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LeaseholdError, Result};

/// Root configuration for a leasehold candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseholdConfig {
    /// Election timings.
    pub election: ElectionConfig,

    /// Lock location and identity.
    pub lock: LockConfig,

    /// Database configuration (required by the postgres backend).
    pub database: Option<DatabaseConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Managed task configuration.
    #[serde(default)]
    pub task: TaskConfig,
}

impl LeaseholdConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| LeaseholdError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| LeaseholdError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section constraints.
    pub fn validate(&self) -> Result<()> {
        self.election.validate()?;

        if self.lock.name.is_empty() {
            return Err(LeaseholdError::Config("lock.name must not be empty".to_string()));
        }

        if self.lock.backend == LockBackend::Postgres {
            match &self.database {
                Some(db) if !db.url.is_empty() => {}
                _ => {
                    return Err(LeaseholdError::Config(
                        "database.url is required for the postgres backend".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the human format.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration for the task that runs while leading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Exit the process once leadership is lost.
    #[serde(default = "default_exit_on_lost_leadership")]
    pub exit_on_lost_leadership: bool,

    /// Reconcile interval of the demo controller.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            exit_on_lost_leadership: default_exit_on_lost_leadership(),
            reconcile_interval_secs: default_reconcile_interval(),
        }
    }
}

fn default_exit_on_lost_leadership() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    10
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

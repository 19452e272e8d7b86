use serde::{Deserialize, Serialize};

/// Lock configuration: where the lease lives and who we are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: LockBackend,

    /// Election name.
    pub name: String,

    /// Election namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Candidate identity (generated when absent).
    pub identity: Option<String>,
}

impl LockConfig {
    /// Create a lock configuration for the given election name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            backend: LockBackend::default(),
            name: name.into(),
            namespace: default_namespace(),
            identity: None,
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Lock store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Lease row in PostgreSQL.
    #[default]
    Postgres,

    /// Process-local store; only useful for a single process.
    Memory,
}

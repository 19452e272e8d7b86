//! Leasehold candidate runtime.
//!
//! Runs one candidate of a leader election and a reconcile loop that only
//! executes while this candidate holds the lease.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use leasehold_core::config::{LeaseholdConfig, LockBackend};
use leasehold_core::election::CandidateId;
use leasehold_core::error::{LeaseholdError, Result};
use leasehold_core::lock::Lock;
use leasehold_runtime::db::Database;
use leasehold_runtime::election::{
    LeaderCallbacks, LeaderElector, LeaderTaskRunner, ManagedTask, TaskFuture,
};
use leasehold_runtime::lock::{MemoryLockStore, PgLeaseLock};

/// Prelude module for common imports.
pub mod prelude {
    pub use tokio_util::sync::CancellationToken;

    pub use leasehold_core::config::{ElectionConfig, LeaseholdConfig, LockConfig};
    pub use leasehold_core::election::{CandidateId, ElectionState, LeaderInfo};
    pub use leasehold_core::error::{LeaseholdError, Result};
    pub use leasehold_core::lock::{Fingerprint, Lock, LockRecord};
    pub use leasehold_runtime::election::{
        FnCallbacks, LeaderCallbacks, LeaderElector, LeaderTaskRunner, ManagedTask, TaskFuture,
    };
    pub use leasehold_runtime::lock::{MemoryLockStore, PgLeaseLock};

    pub use crate::{Leasehold, LeaseholdBuilder};
}

/// Extra time past the lease before the watchdog declares the elector stuck.
const WATCHDOG_SLACK: Duration = Duration::from_secs(5);

/// Demo controller: logs a reconcile pass every interval while leading.
pub struct Reconciler {
    identity: String,
    interval: Duration,
}

impl Reconciler {
    pub fn new(identity: impl Into<String>, interval: Duration) -> Self {
        Self {
            identity: identity.into(),
            interval,
        }
    }
}

impl ManagedTask for Reconciler {
    fn name(&self) -> &str {
        "reconciler"
    }

    fn run(&self, leadership: CancellationToken) -> TaskFuture {
        let identity = self.identity.clone();
        let interval = self.interval;
        Box::pin(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut passes: u64 = 0;
            loop {
                tokio::select! {
                    _ = leadership.cancelled() => break,
                    _ = ticker.tick() => {
                        passes += 1;
                        tracing::info!(identity = %identity, pass = passes, "Reconciling");
                    }
                }
            }
            tracing::info!(identity = %identity, passes, "Reconciler stopped");
            Ok(())
        })
    }
}

/// Callbacks wiring the election to the reconciler and process shutdown.
struct CandidateCallbacks {
    identity: String,
    runner: LeaderTaskRunner<Reconciler>,
    shutdown: CancellationToken,
    exit_on_lost_leadership: bool,
}

impl LeaderCallbacks for CandidateCallbacks {
    fn on_started_leading(&self, leadership: CancellationToken) {
        tracing::info!(identity = %self.identity, "Started leading");
        self.runner.on_started_leading(leadership);
    }

    fn on_stopped_leading(&self) {
        tracing::info!(identity = %self.identity, "Stopped leading");
        self.runner.on_stopped_leading();

        if self.exit_on_lost_leadership && !self.shutdown.is_cancelled() {
            tracing::warn!(identity = %self.identity, "Leadership lost, shutting down");
            self.shutdown.cancel();
        }
    }

    fn on_new_leader(&self, identity: &str) {
        if identity != self.identity {
            tracing::info!(leader = %identity, "Following new leader");
        }
    }
}

/// A leasehold candidate.
pub struct Leasehold {
    config: LeaseholdConfig,
    identity: CandidateId,
    shutdown: CancellationToken,
}

impl Leasehold {
    /// Create a new builder.
    pub fn builder() -> LeaseholdBuilder {
        LeaseholdBuilder::new()
    }

    /// This candidate's identity.
    pub fn identity(&self) -> &CandidateId {
        &self.identity
    }

    /// Get the configuration.
    pub fn config(&self) -> &LeaseholdConfig {
        &self.config
    }

    /// Token that stops [`Leasehold::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run the candidate until shutdown or, when configured, until leadership
    /// is lost.
    pub async fn run(self) -> Result<()> {
        let identity = self.identity.as_str().to_string();
        let lock_config = &self.config.lock;

        let mut db = None;
        let lock: Arc<dyn Lock> = match lock_config.backend {
            LockBackend::Memory => {
                tracing::warn!("Using the in-memory lock: only candidates in this process compete");
                Arc::new(MemoryLockStore::new().lock(
                    &lock_config.namespace,
                    &lock_config.name,
                    &identity,
                ))
            }
            LockBackend::Postgres => {
                let db_config = self.config.database.as_ref().ok_or_else(|| {
                    LeaseholdError::Config("database section is required".to_string())
                })?;
                let database = Database::from_config(db_config).await?;
                database.health_check().await?;
                tracing::info!("Connected to database");

                PgLeaseLock::ensure_schema(database.pool()).await?;
                let lock = PgLeaseLock::new(
                    database.pool().clone(),
                    &lock_config.namespace,
                    &lock_config.name,
                    &identity,
                );
                db = Some(database);
                Arc::new(lock)
            }
        };

        let task = &self.config.task;
        let callbacks = Arc::new(CandidateCallbacks {
            identity: identity.clone(),
            runner: LeaderTaskRunner::new(Reconciler::new(
                &identity,
                Duration::from_secs(task.reconcile_interval_secs),
            )),
            shutdown: self.shutdown.clone(),
            exit_on_lost_leadership: task.exit_on_lost_leadership,
        });

        let elector = Arc::new(LeaderElector::from_parts(
            lock,
            self.config.election,
            callbacks.clone(),
        )?);

        tracing::info!(
            identity = %identity,
            lock = %format!("{}/{}", lock_config.namespace, lock_config.name),
            "Leasehold candidate starting"
        );

        let handle = elector.clone().spawn(self.shutdown.clone());

        let mut watchdog = tokio::time::interval(self.config.election.retry_period());
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    self.shutdown.cancel();
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Received shutdown notification");
                    break;
                }
                _ = watchdog.tick() => {
                    if let Err(e) = elector.check(WATCHDOG_SLACK) {
                        tracing::error!("Election watchdog failed: {}", e);
                        self.shutdown.cancel();
                        break;
                    }
                }
            }
        }

        if let Err(e) = handle.await {
            tracing::error!("Election task failed: {}", e);
        }
        callbacks.runner.wait_drained().await;

        if let Some(db) = db {
            db.close().await;
        }

        tracing::info!(identity = %identity, "Leasehold candidate stopped");
        Ok(())
    }
}

/// Builder for a [`Leasehold`] candidate.
pub struct LeaseholdBuilder {
    config: Option<LeaseholdConfig>,
    identity: Option<String>,
    shutdown: Option<CancellationToken>,
}

impl LeaseholdBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            identity: None,
            shutdown: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: LeaseholdConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the identity from the configuration.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Use an externally owned shutdown token.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Build the candidate.
    pub fn build(self) -> Result<Leasehold> {
        let config = self
            .config
            .ok_or_else(|| LeaseholdError::Config("Configuration is required".to_string()))?;
        config.validate()?;

        let identity = match self.identity.or_else(|| config.lock.identity.clone()) {
            Some(id) if id.is_empty() => {
                return Err(LeaseholdError::Config("identity must not be empty".to_string()))
            }
            Some(id) => CandidateId::new(id),
            None => CandidateId::for_host(&local_hostname()),
        };

        Ok(Leasehold {
            config,
            identity,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

impl Default for LeaseholdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMORY_CONFIG: &str = r#"
        [election]
        lease_duration_secs = 10
        renew_deadline_secs = 6
        retry_period_secs = 2
        release_on_cancel = true

        [lock]
        backend = "memory"
        name = "leader-tutorials"
        identity = "node-a"

        [task]
        reconcile_interval_secs = 1
        exit_on_lost_leadership = false
    "#;

    fn memory_config() -> LeaseholdConfig {
        LeaseholdConfig::parse_toml(MEMORY_CONFIG).unwrap()
    }

    #[test]
    fn test_builder_requires_config() {
        assert!(LeaseholdBuilder::new().build().is_err());
    }

    #[test]
    fn test_builder_identity_resolution() {
        let leasehold = Leasehold::builder().config(memory_config()).build().unwrap();
        assert_eq!(leasehold.identity().as_str(), "node-a");

        let leasehold = Leasehold::builder()
            .config(memory_config())
            .identity("node-b")
            .build()
            .unwrap();
        assert_eq!(leasehold.identity().as_str(), "node-b");

        let mut config = memory_config();
        config.lock.identity = None;
        let leasehold = Leasehold::builder().config(config).build().unwrap();
        assert!(leasehold.identity().as_str().contains('_'));
    }

    #[test]
    fn test_builder_rejects_empty_identity() {
        let result = Leasehold::builder().config(memory_config()).identity("").build();
        assert!(matches!(result, Err(LeaseholdError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconciler_stops_with_leadership() {
        let leadership = CancellationToken::new();
        let handle = tokio::spawn(
            Reconciler::new("node-a", Duration::from_secs(1)).run(leadership.clone()),
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!handle.is_finished());

        leadership.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[test]
    fn test_lost_leadership_requests_shutdown() {
        let shutdown = CancellationToken::new();
        let callbacks = CandidateCallbacks {
            identity: "node-a".to_string(),
            runner: LeaderTaskRunner::new(Reconciler::new("node-a", Duration::from_secs(1))),
            shutdown: shutdown.clone(),
            exit_on_lost_leadership: true,
        };

        callbacks.on_stopped_leading();
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_memory_backend_until_shutdown() {
        let leasehold = Leasehold::builder().config(memory_config()).build().unwrap();
        let shutdown = leasehold.shutdown_token();
        let handle = tokio::spawn(leasehold.run());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(!handle.is_finished());

        shutdown.cancel();
        assert!(handle.await.unwrap().is_ok());
    }
}

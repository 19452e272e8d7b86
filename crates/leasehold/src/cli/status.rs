use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use console::style;

use leasehold_core::config::{LeaseholdConfig, LockBackend};
use leasehold_core::election::LeaderInfo;
use leasehold_core::error::LeaseholdError;
use leasehold_core::lock::Lock;
use leasehold_runtime::db::Database;
use leasehold_runtime::lock::PgLeaseLock;

/// Identity used by the read-only status lock handle. It never writes.
const OBSERVER_IDENTITY: &str = "leasehold-status";

/// Show the current holder of a lease.
#[derive(Parser)]
pub struct StatusCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "leasehold.toml")]
    pub config: String,
}

impl StatusCommand {
    /// Execute the status command.
    pub async fn execute(self) -> Result<()> {
        let _ = dotenvy::dotenv();

        let config = LeaseholdConfig::from_file(&self.config)
            .with_context(|| format!("Failed to load {}", self.config))?;

        if config.lock.backend == LockBackend::Memory {
            anyhow::bail!("The memory backend keeps no state outside its process");
        }
        let db_config = config
            .database
            .as_ref()
            .context("database section is required")?;

        let db = Database::from_config(db_config).await?;
        db.health_check().await?;
        let lock = PgLeaseLock::new(
            db.pool().clone(),
            &config.lock.namespace,
            &config.lock.name,
            OBSERVER_IDENTITY,
        );

        let result = lock.get().await;
        db.close().await;

        println!();
        println!("  Lease {}", style(lock.describe()).bold());

        match result {
            Ok((record, fingerprint)) => match LeaderInfo::from_record(&record) {
                Some(info) => print_leader(&info, fingerprint.as_str()),
                None => println!(
                    "  {} (released, {} transitions)",
                    style("no holder").yellow(),
                    record.leader_transitions
                ),
            },
            Err(LeaseholdError::NotFound(_)) => {
                println!("  {}", style("no lease record").yellow());
            }
            Err(e) => return Err(e.into()),
        }
        println!();

        Ok(())
    }
}

fn print_leader(info: &LeaderInfo, fingerprint: &str) {
    let state = if info.is_valid() {
        style("valid").green()
    } else {
        style("expired").red()
    };

    println!("  Holder:      {}", style(&info.identity).cyan());
    println!("  Acquired:    {}", info.acquired_at);
    println!("  Renewed:     {}", info.renewed_at);
    println!(
        "  Lease until: {} ({}, {}s from now)",
        info.lease_until,
        state,
        (info.lease_until - Utc::now()).num_seconds()
    );
    println!("  Transitions: {}", info.transitions);
    println!("  Version:     {}", fingerprint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_rejects_memory_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leasehold.toml");
        std::fs::write(
            &path,
            r#"
            [election]
            lease_duration_secs = 15
            renew_deadline_secs = 10
            retry_period_secs = 2
            release_on_cancel = true

            [lock]
            backend = "memory"
            name = "leader-tutorials"
            "#,
        )
        .unwrap();

        let cmd = StatusCommand {
            config: path.display().to_string(),
        };
        let err = cmd.execute().await.unwrap_err();
        assert!(err.to_string().contains("memory backend"));
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leasehold_core::config::{LeaseholdConfig, LoggingConfig};

use crate::runtime::Leasehold;

/// Run an election candidate.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "leasehold.toml")]
    pub config: String,

    /// Candidate identity (overrides config).
    #[arg(short, long)]
    pub identity: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let _ = dotenvy::dotenv();

        let config_path = std::path::Path::new(&self.config);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }

        let config = LeaseholdConfig::from_file(config_path)
            .with_context(|| format!("Failed to load {}", self.config))?;

        init_tracing(&config.logging, self.verbose);
        info!("Loaded configuration from {}", self.config);

        let mut builder = Leasehold::builder().config(config);
        if let Some(identity) = self.identity.clone() {
            builder = builder.identity(identity);
        }
        let leasehold = builder.build()?;

        println!();
        println!(
            "  {} v{}",
            style("LEASEHOLD").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  Candidate {} competing for {}/{}",
            style(leasehold.identity()).bold(),
            leasehold.config().lock.namespace,
            leasehold.config().lock.name
        );
        println!();

        leasehold.run().await?;

        Ok(())
    }
}

/// Install the global subscriber. RUST_LOG wins over the configured level.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

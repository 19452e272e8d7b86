mod run;
mod status;

pub use run::RunCommand;
pub use status::StatusCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Leasehold - lease-based leader election
#[derive(Parser)]
#[command(name = "leasehold")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run an election candidate.
    Run(RunCommand),

    /// Show the current holder of a lease.
    Status(StatusCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["leasehold", "run", "--identity", "node-a"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::try_parse_from(["leasehold", "status", "-c", "custom.toml"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["leasehold", "elect"]).is_err());
    }
}

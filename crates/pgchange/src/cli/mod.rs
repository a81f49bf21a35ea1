mod context;
mod create;
mod reset;
mod run;
mod run_latest;
mod status;

pub use context::GlobalArgs;
pub use create::CreateCommand;
pub use reset::ResetCommand;
pub use run::RunCommand;
pub use run_latest::RunLatestCommand;
pub use status::StatusCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pgchange_core::migration::{validate_file_name, validate_label};

/// pgchange - versioned SQL migrations for PostgreSQL
#[derive(Parser)]
#[command(name = "pgchange")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a new migration file.
    Create(CreateCommand),

    /// Apply one named migration.
    Run(RunCommand),

    /// Apply all unapplied migrations in timestamp order.
    RunLatest(RunLatestCommand),

    /// Drop and recreate an empty migration ledger.
    Reset(ResetCommand),

    /// Show applied, pending and drifted migrations.
    Status(StatusCommand),
}

impl Commands {
    /// Check arguments that need no database.
    pub fn validate(&self) -> Result<()> {
        match self {
            Commands::Create(cmd) => validate_label(&cmd.name)?,
            Commands::Run(cmd) => validate_file_name(&cmd.name)?,
            Commands::RunLatest(_) | Commands::Reset(_) | Commands::Status(_) => {}
        }
        Ok(())
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Bad input must fail before anything is connected or created.
        self.command.validate()?;

        let reconciler = context::connect(&self.global).await?;

        match self.command {
            Commands::Create(cmd) => cmd.execute(&reconciler).await,
            Commands::Run(cmd) => cmd.execute(&reconciler).await,
            Commands::RunLatest(cmd) => cmd.execute(&reconciler).await,
            Commands::Reset(cmd) => cmd.execute(&reconciler).await,
            Commands::Status(cmd) => cmd.execute(&reconciler).await,
        }
    }
}

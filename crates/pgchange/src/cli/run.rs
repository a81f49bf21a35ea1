use anyhow::Result;
use clap::Parser;
use console::style;

use pgchange_runtime::{PgLedgerStore, Reconciler};

/// Apply one named migration.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// Migration file name, e.g. `1724709481967_add_users_table.sql`.
    pub name: String,
}

impl RunCommand {
    pub async fn execute(self, reconciler: &Reconciler<PgLedgerStore>) -> Result<()> {
        reconciler.run(&self.name).await?;

        println!(
            "  {} Applied {}",
            style("✓").green(),
            style(&self.name).cyan()
        );
        Ok(())
    }
}

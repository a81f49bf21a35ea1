use anyhow::Result;
use clap::Parser;
use console::style;

use pgchange_runtime::{PgLedgerStore, Reconciler};

/// Apply all unapplied migrations.
#[derive(Parser, Debug)]
pub struct RunLatestCommand {}

impl RunLatestCommand {
    pub async fn execute(self, reconciler: &Reconciler<PgLedgerStore>) -> Result<()> {
        let applied = reconciler.run_latest().await?;

        if applied.is_empty() {
            println!("  {} Already up to date", style("ℹ").blue());
            return Ok(());
        }

        for name in &applied {
            println!("  {} {}", style("✓").green(), style(name).cyan());
        }
        println!(
            "  {} Applied {} migration(s)",
            style("✓").green(),
            applied.len()
        );
        Ok(())
    }
}

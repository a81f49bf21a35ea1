use anyhow::Result;
use clap::Parser;
use console::style;

use pgchange_runtime::{PgLedgerStore, Reconciler};

/// Drop and recreate the ledger table.
///
/// Execution history is lost; migration files and the schema they created
/// are left as they are.
#[derive(Parser, Debug)]
pub struct ResetCommand {}

impl ResetCommand {
    pub async fn execute(self, reconciler: &Reconciler<PgLedgerStore>) -> Result<()> {
        reconciler.reset().await?;

        println!(
            "  {} Ledger {} reset; every migration is now unapplied",
            style("✓").green(),
            style(reconciler.store().table()).cyan()
        );
        Ok(())
    }
}

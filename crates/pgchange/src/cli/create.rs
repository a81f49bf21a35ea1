use anyhow::Result;
use clap::Parser;
use console::style;

use pgchange_runtime::{PgLedgerStore, Reconciler};

/// Scaffold a new migration file.
#[derive(Parser, Debug)]
pub struct CreateCommand {
    /// Human-readable label, e.g. `add_users_table`.
    pub name: String,
}

impl CreateCommand {
    pub async fn execute(self, reconciler: &Reconciler<PgLedgerStore>) -> Result<()> {
        let created = reconciler.create(&self.name).await?;
        let path = reconciler.directory().path().join(created.file_name());

        println!(
            "  {} Created migration {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
        Ok(())
    }
}

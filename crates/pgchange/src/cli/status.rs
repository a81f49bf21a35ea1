use anyhow::Result;
use clap::Parser;
use console::style;

use pgchange_runtime::{PgLedgerStore, Reconciler};

/// Show migration status.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Print the status as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(self, reconciler: &Reconciler<PgLedgerStore>) -> Result<()> {
        let status = reconciler.status().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!();
        println!(
            "  {}  {} Migration Status",
            style("⚒️").bold(),
            style("PGCHANGE").bold().cyan()
        );
        println!();

        if status.applied.is_empty() && status.pending.is_empty() && status.drifted.is_empty() {
            println!(
                "  {} No migrations found in {}",
                style("ℹ").blue(),
                reconciler.directory().path().display()
            );
            return Ok(());
        }

        // Show applied migrations
        if !status.applied.is_empty() {
            println!("  {} Applied:", style("✓").green());
            for entry in &status.applied {
                let at = entry
                    .executed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "    {} {} ({})",
                    style(&entry.name).cyan(),
                    style("at").dim(),
                    at
                );
            }
        }

        // Show pending migrations
        if !status.pending.is_empty() {
            if !status.applied.is_empty() {
                println!();
            }
            println!("  {} Pending:", style("○").yellow());
            for name in &status.pending {
                println!("    {} {}", style("→").dim(), style(name).yellow());
            }
        }

        // Ledger entries without a file need manual attention
        if !status.drifted.is_empty() {
            println!();
            println!("  {} Missing from directory:", style("✗").red());
            for name in &status.drifted {
                println!("    {} {}", style("!").red(), style(name).red());
            }
        }

        println!();
        println!(
            "  {} {} applied, {} pending, {} missing",
            style("ℹ").blue(),
            status.applied.len(),
            status.pending.len(),
            status.drifted.len()
        );
        println!();

        Ok(())
    }
}

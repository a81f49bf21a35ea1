use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;

use pgchange_core::config::PgChangeConfig;
use pgchange_runtime::{Database, MigrationDirectory, PgLedgerStore, Reconciler};

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = "pgchange.toml", global = true)]
    pub config: PathBuf,

    /// Migrations directory path (overrides config).
    #[arg(short, long, global = true)]
    pub migrations_dir: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Load configuration, connect, and initialize the directory and ledger.
pub async fn connect(args: &GlobalArgs) -> Result<Reconciler<PgLedgerStore>> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let mut config = PgChangeConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(dir) = &args.migrations_dir {
        config.migrations.dir = dir.clone();
    }
    config.validate()?;

    let db = Database::from_config(&config.database).await?;
    debug!(
        "Using ledger table {} and directory {}",
        config.migrations.table,
        config.migrations.dir.display()
    );

    let store = PgLedgerStore::new(db.pool().clone(), config.migrations.table.clone())
        .with_transactional(config.migrations.transactional);
    let reconciler = Reconciler::new(store, MigrationDirectory::new(&config.migrations.dir));
    reconciler.initialize().await?;

    Ok(reconciler)
}

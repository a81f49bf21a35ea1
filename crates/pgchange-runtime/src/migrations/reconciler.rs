//! Applying migrations from disk and keeping the ledger in step.
//!
//! Everything here is strictly sequential: migrations often depend on the
//! schema left behind by earlier ones, so they are applied one at a time in
//! timestamp order and the first failure stops the batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use pgchange_core::error::{PgChangeError, Result};
use pgchange_core::migration::{self, validate_file_name, MigrationName};

use super::directory::MigrationDirectory;
use super::store::{LedgerEntry, LedgerStore};

/// Snapshot of the ledger against the migrations directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationStatus {
    /// Ledger entries whose files are present.
    pub applied: Vec<LedgerEntry>,
    /// Unapplied migrations in execution order.
    pub pending: Vec<String>,
    /// Ledger entries with no file on disk.
    pub drifted: Vec<String>,
}

impl MigrationStatus {
    pub fn is_consistent(&self) -> bool {
        self.drifted.is_empty()
    }
}

/// Reconciles a migrations directory with a ledger store.
pub struct Reconciler<S> {
    store: S,
    directory: MigrationDirectory,
}

impl<S: LedgerStore> Reconciler<S> {
    pub fn new(store: S, directory: MigrationDirectory) -> Self {
        Self { store, directory }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &MigrationDirectory {
        &self.directory
    }

    /// Ensure the migrations directory and the ledger table exist.
    pub async fn initialize(&self) -> Result<()> {
        self.directory.ensure().await?;
        self.store.ensure_ledger().await?;
        debug!(
            "Initialized migrations directory {}",
            self.directory.path().display()
        );
        Ok(())
    }

    /// Scaffold a new migration file. The ledger is not touched.
    pub async fn create(&self, name: &str) -> Result<MigrationName> {
        self.create_at(name, Utc::now()).await
    }

    /// Scaffold a new migration file stamped with `now`.
    pub async fn create_at(&self, name: &str, now: DateTime<Utc>) -> Result<MigrationName> {
        let created = self.directory.scaffold(name, now).await?;
        info!("Created migration {}", created);
        Ok(created)
    }

    /// Apply a single migration by file name.
    ///
    /// Fails if the ledger already records it.
    pub async fn run(&self, name: &str) -> Result<()> {
        self.run_migration(name, false).await
    }

    async fn run_migration(&self, name: &str, skip_ledger_check: bool) -> Result<()> {
        validate_file_name(name)?;

        if !skip_ledger_check && self.store.is_applied(name).await? {
            return Err(PgChangeError::AlreadyApplied(name.to_string()));
        }

        let migration = self.directory.load(name).await?;

        info!("Running migration {}", name);
        self.store.apply(&migration).await
    }

    /// Apply every migration on disk that the ledger has not recorded.
    ///
    /// Returns the names applied, in order. Fails before running anything
    /// if the ledger references a file that is no longer on disk.
    pub async fn run_latest(&self) -> Result<Vec<String>> {
        let on_disk = self.directory.list().await?;
        let applied = self.applied_names().await?;

        let plan = migration::plan(&on_disk, &applied)?;
        debug!(
            "{} migration(s) on disk, {} applied, {} pending",
            on_disk.len(),
            plan.applied.len(),
            plan.pending.len()
        );

        if plan.is_empty() {
            info!("No pending migrations");
            return Ok(Vec::new());
        }

        let mut ran = Vec::with_capacity(plan.pending.len());
        for name in &plan.pending {
            // Membership was settled by the plan.
            self.run_migration(name.file_name(), true).await?;
            ran.push(name.file_name().to_string());
        }

        Ok(ran)
    }

    /// Drop and recreate the ledger. Migration files are left alone and
    /// nothing is re-run.
    pub async fn reset(&self) -> Result<()> {
        warn!("Dropping migration ledger; all execution history will be forgotten");
        self.store.drop_ledger().await?;
        self.store.ensure_ledger().await
    }

    /// Compare the ledger with the directory without changing anything.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let on_disk = self.directory.list().await?;
        let entries = self.store.applied().await?;

        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        let drifted: Vec<String> = migration::drifted(&on_disk, &names)
            .into_iter()
            .map(str::to_string)
            .collect();

        let (applied, _): (Vec<LedgerEntry>, Vec<LedgerEntry>) = entries
            .into_iter()
            .partition(|e| !drifted.contains(&e.name));
        let present: Vec<String> = applied.iter().map(|e| e.name.clone()).collect();

        let plan = migration::plan(&on_disk, &present)?;
        let pending = plan
            .pending
            .iter()
            .map(|n| n.file_name().to_string())
            .collect();

        Ok(MigrationStatus {
            applied,
            pending,
            drifted,
        })
    }

    async fn applied_names(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .applied()
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLedgerStore;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, sql: &str) {
        fs::write(dir.path().join(name), sql).unwrap();
    }

    fn reconciler(dir: &TempDir, store: MemoryLedgerStore) -> Reconciler<MemoryLedgerStore> {
        Reconciler::new(store, MigrationDirectory::new(dir.path()))
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let r = Reconciler::new(
            MemoryLedgerStore::new(),
            MigrationDirectory::new(dir.path().join("migrations")),
        );

        r.initialize().await.unwrap();
        r.initialize().await.unwrap();

        assert!(dir.path().join("migrations").is_dir());
        assert_eq!(r.store().ledger_names().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_initialize_keeps_existing_ledger() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(["1_a.sql"]));

        r.initialize().await.unwrap();
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1_a.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_create_writes_file_without_touching_ledger() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir, MemoryLedgerStore::new());
        r.initialize().await.unwrap();

        let now = Utc.timestamp_millis_opt(1724709481967).unwrap();
        let name = r.create_at("foo", now).await.unwrap();

        assert_eq!(name.file_name(), "1724709481967_foo.sql");
        assert!(dir.path().join("1724709481967_foo.sql").is_file());
        assert_eq!(r.store().ledger_names().await, Some(vec![]));
        assert!(r.store().executions().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir, MemoryLedgerStore::new());

        let err = r.create("").await.unwrap_err();
        assert!(matches!(err, PgChangeError::InvalidArgument(_)));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_applies_and_records() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(Vec::<String>::new()));

        r.run("1_a.sql").await.unwrap();

        assert_eq!(r.store().executions().await, vec!["1_a.sql"]);
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1_a.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_run_refuses_already_applied() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(["1_a.sql"]));

        let err = r.run("1_a.sql").await.unwrap_err();

        assert!(matches!(err, PgChangeError::AlreadyApplied(name) if name == "1_a.sql"));
        assert!(r.store().executions().await.is_empty());
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1_a.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_run_missing_file() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(Vec::<String>::new()));

        let err = r.run("2_missing.sql").await.unwrap_err();
        assert!(matches!(err, PgChangeError::NotFound(_)));
        assert_eq!(r.store().ledger_names().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_run_requires_name() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(Vec::<String>::new()));

        let err = r.run("").await.unwrap_err();
        assert!(matches!(err, PgChangeError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_failed_migration_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        let store = MemoryLedgerStore::with_applied(Vec::<String>::new());
        store.fail_on("1_a.sql").await;
        let r = reconciler(&dir, store);

        let err = r.run("1_a.sql").await.unwrap_err();
        assert!(matches!(err, PgChangeError::Execution { .. }));
        assert_eq!(r.store().ledger_names().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_run_latest_applies_set_difference() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        write(&dir, "2_b.sql", "SELECT 2;");
        write(&dir, "3_c.sql", "SELECT 3;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(["1_a.sql"]));

        let ran = r.run_latest().await.unwrap();

        assert_eq!(ran, vec!["2_b.sql", "3_c.sql"]);
        assert_eq!(r.store().executions().await, vec!["2_b.sql", "3_c.sql"]);
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec![
                "1_a.sql".to_string(),
                "2_b.sql".to_string(),
                "3_c.sql".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_run_latest_orders_by_timestamp() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1724709481967_second.sql", "SELECT 2;");
        write(&dir, "999_first.sql", "SELECT 1;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(Vec::<String>::new()));

        let ran = r.run_latest().await.unwrap();
        assert_eq!(ran, vec!["999_first.sql", "1724709481967_second.sql"]);
    }

    #[tokio::test]
    async fn test_run_latest_detects_drift_before_applying() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(["0_x.sql"]));

        let err = r.run_latest().await.unwrap_err();

        match err {
            PgChangeError::Drift { missing } => assert_eq!(missing, vec!["0_x.sql"]),
            other => panic!("expected drift, got {:?}", other),
        }
        assert!(r.store().executions().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_latest_skips_readme() {
        let dir = TempDir::new().unwrap();
        write(&dir, "README.md", "# Migrations");
        write(&dir, "1_a.sql", "SELECT 1;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(Vec::<String>::new()));

        let ran = r.run_latest().await.unwrap();

        assert_eq!(ran, vec!["1_a.sql"]);
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1_a.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_run_latest_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        write(&dir, "2_b.sql", "SELECT 2;");
        write(&dir, "3_c.sql", "SELECT 3;");
        let store = MemoryLedgerStore::with_applied(Vec::<String>::new());
        store.fail_on("2_b.sql").await;
        let r = reconciler(&dir, store);

        assert!(r.run_latest().await.is_err());
        assert_eq!(r.store().executions().await, vec!["1_a.sql", "2_b.sql"]);
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1_a.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_single_migration_scenario() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "1724709481967_foo.sql",
            "CREATE TABLE users (id SERIAL PRIMARY KEY, email TEXT NOT NULL);",
        );
        let r = reconciler(&dir, MemoryLedgerStore::new());
        r.initialize().await.unwrap();

        let ran = r.run_latest().await.unwrap();

        assert_eq!(ran, vec!["1724709481967_foo.sql"]);
        assert_eq!(
            r.store().ledger_names().await,
            Some(vec!["1724709481967_foo.sql".to_string()])
        );
    }

    #[tokio::test]
    async fn test_reset_clears_history_only() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1_a.sql", "SELECT 1;");
        write(&dir, "2_b.sql", "SELECT 2;");
        let r = reconciler(&dir, MemoryLedgerStore::new());
        r.initialize().await.unwrap();
        r.run_latest().await.unwrap();

        r.reset().await.unwrap();

        assert_eq!(r.store().ledger_names().await, Some(vec![]));
        assert!(dir.path().join("1_a.sql").is_file());
        assert!(dir.path().join("2_b.sql").is_file());
        assert_eq!(r.store().executions().await.len(), 2);

        let ran = r.run_latest().await.unwrap();
        assert_eq!(ran, vec!["1_a.sql", "2_b.sql"]);
    }

    #[tokio::test]
    async fn test_status() {
        let dir = TempDir::new().unwrap();
        write(&dir, "README.md", "# Migrations");
        write(&dir, "1_a.sql", "SELECT 1;");
        write(&dir, "2_b.sql", "SELECT 2;");
        let r = reconciler(&dir, MemoryLedgerStore::with_applied(["1_a.sql", "0_gone.sql"]));

        let status = r.status().await.unwrap();

        assert_eq!(
            status.applied.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["1_a.sql"]
        );
        assert_eq!(status.pending, vec!["2_b.sql"]);
        assert_eq!(status.drifted, vec!["0_gone.sql"]);
        assert!(!status.is_consistent());
    }
}

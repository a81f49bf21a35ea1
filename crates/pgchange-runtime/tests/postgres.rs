//! Integration tests against a real PostgreSQL server.
//!
//! These only run when TEST_DATABASE_URL is set. DATABASE_URL is never read
//! here so a development database cannot be touched by accident.

use std::sync::atomic::{AtomicUsize, Ordering};

use pgchange_core::config::{DatabaseConfig, LedgerTable};
use pgchange_core::error::PgChangeError;
use pgchange_runtime::{Database, LedgerStore, MigrationDirectory, PgLedgerStore, Reconciler};
use tempfile::TempDir;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::SeqCst)
    )
}

async fn connect() -> Option<Database> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set; skipping");
            return None;
        }
    };
    let config = DatabaseConfig {
        url,
        ..Default::default()
    };
    Some(Database::from_config(&config).await.unwrap())
}

struct Fixture {
    db: Database,
    dir: TempDir,
    ledger: String,
    reconciler: Reconciler<PgLedgerStore>,
}

impl Fixture {
    async fn new(transactional: bool) -> Option<Self> {
        let db = connect().await?;
        let dir = TempDir::new().unwrap();
        let ledger = unique("pgchange_ledger");
        let store = PgLedgerStore::new(db.pool().clone(), LedgerTable::parse(&ledger).unwrap())
            .with_transactional(transactional);
        let reconciler = Reconciler::new(store, MigrationDirectory::new(dir.path()));
        reconciler.initialize().await.unwrap();
        Some(Self {
            db,
            dir,
            ledger,
            reconciler,
        })
    }

    fn write(&self, name: &str, sql: &str) {
        std::fs::write(self.dir.path().join(name), sql).unwrap();
    }

    async fn drop_table(&self, table: &str) {
        sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
            .execute(self.db.pool())
            .await
            .unwrap();
    }

    async fn cleanup(self, tables: &[&str]) {
        for table in tables {
            self.drop_table(table).await;
        }
        self.drop_table(&self.ledger).await;
        self.db.close().await;
    }
}

#[tokio::test]
async fn test_run_latest_against_postgres() {
    let Some(fx) = Fixture::new(true).await else {
        return;
    };
    let users = unique("pgchange_users");
    fx.write(
        "1724709481967_foo.sql",
        &format!(
            "CREATE TABLE {} (id SERIAL PRIMARY KEY, email TEXT NOT NULL, password TEXT NOT NULL);",
            users
        ),
    );
    fx.write("README.md", "# Migrations");

    let ran = fx.reconciler.run_latest().await.unwrap();
    assert_eq!(ran, vec!["1724709481967_foo.sql"]);

    let entries = fx.reconciler.store().applied().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "1724709481967_foo.sql");
    assert!(entries[0].executed_at.is_some());

    let err = fx.reconciler.run("1724709481967_foo.sql").await.unwrap_err();
    assert!(matches!(err, PgChangeError::AlreadyApplied(_)));

    fx.cleanup(&[&users]).await;
}

#[tokio::test]
async fn test_failed_transactional_migration_rolls_back() {
    let Some(fx) = Fixture::new(true).await else {
        return;
    };
    let table = unique("pgchange_partial");
    fx.write(
        "1_partial.sql",
        &format!("CREATE TABLE {} (id INT);\nSELECT * FROM does_not_exist;", table),
    );

    let err = fx.reconciler.run("1_partial.sql").await.unwrap_err();
    assert!(matches!(err, PgChangeError::Execution { .. }));

    let exists: (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
        .bind(&table)
        .fetch_one(fx.db.pool())
        .await
        .unwrap();
    assert!(!exists.0, "first statement should have been rolled back");
    assert!(!fx.reconciler.store().is_applied("1_partial.sql").await.unwrap());

    fx.cleanup(&[&table]).await;
}

#[tokio::test]
async fn test_reset_recreates_empty_ledger() {
    let Some(fx) = Fixture::new(false).await else {
        return;
    };
    fx.write("1_noop.sql", "SELECT 1 + 1;");
    fx.reconciler.run_latest().await.unwrap();

    fx.reconciler.reset().await.unwrap();
    assert!(fx.reconciler.store().applied().await.unwrap().is_empty());
    assert!(fx.dir.path().join("1_noop.sql").is_file());

    let ran = fx.reconciler.run_latest().await.unwrap();
    assert_eq!(ran, vec!["1_noop.sql"]);

    fx.cleanup(&[]).await;
}

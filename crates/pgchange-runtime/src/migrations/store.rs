//! Ledger storage.
//!
//! The ledger is the table recording which migrations have run. The
//! reconciler only talks to it through [`LedgerStore`], so the PostgreSQL
//! implementation can be swapped for an in-memory one in tests.

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use pgchange_core::config::LedgerTable;
use pgchange_core::error::{PgChangeError, Result};
use pgchange_core::migration::Migration;

/// Boxed future returned by [`LedgerStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A row in the ledger table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub name: String,
    pub executed_at: Option<NaiveDateTime>,
}

/// Storage for the migration ledger and execution of migration bodies.
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table if it does not exist.
    fn ensure_ledger(&self) -> StoreFuture<'_, ()>;

    /// Whether a ledger entry exists for `name`.
    fn is_applied<'a>(&'a self, name: &'a str) -> StoreFuture<'a, bool>;

    /// All ledger entries, ordered by name.
    fn applied(&self) -> StoreFuture<'_, Vec<LedgerEntry>>;

    /// Execute the migration body, then record it in the ledger.
    ///
    /// No ledger entry is written if any statement fails.
    fn apply<'a>(&'a self, migration: &'a Migration) -> StoreFuture<'a, ()>;

    /// Drop the ledger table, forgetting every recorded migration.
    fn drop_ledger(&self) -> StoreFuture<'_, ()>;
}

/// PostgreSQL-backed ledger.
pub struct PgLedgerStore {
    pool: PgPool,
    table: LedgerTable,
    transactional: bool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, table: LedgerTable) -> Self {
        Self {
            pool,
            table,
            transactional: true,
        }
    }

    /// Whether a migration and its ledger insert share one transaction.
    pub fn with_transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    pub fn table(&self) -> &LedgerTable {
        &self.table
    }

    fn insert_sql(&self) -> String {
        format!("INSERT INTO {} (name) VALUES ($1)", self.table.quoted())
    }

    async fn apply_in_transaction(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for statement in migration.statements() {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| PgChangeError::execution(&migration.name, e))?;
        }

        let insert = self.insert_sql();
        sqlx::query(&insert)
            .bind(&migration.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PgChangeError::Database(format!(
                    "Failed to record migration '{}': {}",
                    migration.name, e
                ))
            })?;

        tx.commit().await?;
        Ok(())
    }

    // Statements and the ledger insert are separate commits here. A crash in
    // between leaves the migration applied but unrecorded.
    async fn apply_without_transaction(&self, migration: &Migration) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        for statement in migration.statements() {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| PgChangeError::execution(&migration.name, e))?;
        }

        let insert = self.insert_sql();
        sqlx::query(&insert)
            .bind(&migration.name)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                PgChangeError::Database(format!(
                    "Failed to record migration '{}': {}",
                    migration.name, e
                ))
            })?;

        Ok(())
    }
}

impl LedgerStore for PgLedgerStore {
    fn ensure_ledger(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    name TEXT PRIMARY KEY,
                    executed_at TIMESTAMP DEFAULT NOW()
                )
                "#,
                self.table.quoted()
            );
            sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                PgChangeError::Database(format!("Failed to create ledger table: {}", e))
            })?;
            debug!("Ledger table {} ready", self.table);
            Ok(())
        })
    }

    fn is_applied<'a>(&'a self, name: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let sql = format!("SELECT name FROM {} WHERE name = $1", self.table.quoted());
            let row: Option<(String,)> = sqlx::query_as(&sql)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    PgChangeError::Database(format!("Failed to query ledger: {}", e))
                })?;
            Ok(row.is_some())
        })
    }

    fn applied(&self) -> StoreFuture<'_, Vec<LedgerEntry>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT name, executed_at FROM {} ORDER BY name",
                self.table.quoted()
            );
            let rows: Vec<(String, Option<NaiveDateTime>)> = sqlx::query_as(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    PgChangeError::Database(format!("Failed to get applied migrations: {}", e))
                })?;

            Ok(rows
                .into_iter()
                .map(|(name, executed_at)| LedgerEntry { name, executed_at })
                .collect())
        })
    }

    fn apply<'a>(&'a self, migration: &'a Migration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.transactional {
                self.apply_in_transaction(migration).await?;
            } else {
                self.apply_without_transaction(migration).await?;
            }
            info!("Migration applied: {}", migration.name);
            Ok(())
        })
    }

    fn drop_ledger(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let sql = format!("DROP TABLE IF EXISTS {}", self.table.quoted());
            sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
                PgChangeError::Database(format!("Failed to drop ledger table: {}", e))
            })?;
            info!("Dropped ledger table {}", self.table);
            Ok(())
        })
    }
}

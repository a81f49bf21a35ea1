use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDateTime, Utc};
use tokio::sync::Mutex;

use pgchange_core::error::PgChangeError;
use pgchange_core::migration::Migration;

use crate::migrations::{LedgerEntry, LedgerStore, StoreFuture};

#[derive(Default)]
struct State {
    /// `None` while the ledger table does not exist.
    ledger: Option<BTreeMap<String, NaiveDateTime>>,
    /// Every migration body executed, in order.
    executions: Vec<String>,
    failing: HashSet<String>,
}

/// In-memory ledger that records which migration bodies were executed.
#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    /// A store whose ledger table has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with an existing ledger containing `names`.
    pub fn with_applied<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let now = Utc::now().naive_utc();
        let ledger = names.into_iter().map(|n| (n.into(), now)).collect();
        Self {
            state: Mutex::new(State {
                ledger: Some(ledger),
                ..Default::default()
            }),
        }
    }

    /// Make the body of `name` fail when applied.
    pub async fn fail_on(&self, name: impl Into<String>) {
        self.state.lock().await.failing.insert(name.into());
    }

    /// Names of migration bodies executed so far.
    pub async fn executions(&self) -> Vec<String> {
        self.state.lock().await.executions.clone()
    }

    /// Ledger names, or `None` if the ledger table does not exist.
    pub async fn ledger_names(&self) -> Option<Vec<String>> {
        self.state
            .lock()
            .await
            .ledger
            .as_ref()
            .map(|ledger| ledger.keys().cloned().collect())
    }
}

fn missing_table() -> PgChangeError {
    PgChangeError::Database("ledger table does not exist".to_string())
}

impl LedgerStore for MemoryLedgerStore {
    fn ensure_ledger(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.ledger.get_or_insert_with(BTreeMap::new);
            Ok(())
        })
    }

    fn is_applied<'a>(&'a self, name: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let ledger = state.ledger.as_ref().ok_or_else(missing_table)?;
            Ok(ledger.contains_key(name))
        })
    }

    fn applied(&self) -> StoreFuture<'_, Vec<LedgerEntry>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let ledger = state.ledger.as_ref().ok_or_else(missing_table)?;
            Ok(ledger
                .iter()
                .map(|(name, at)| LedgerEntry {
                    name: name.clone(),
                    executed_at: Some(*at),
                })
                .collect())
        })
    }

    fn apply<'a>(&'a self, migration: &'a Migration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.ledger.is_none() {
                return Err(missing_table());
            }

            state.executions.push(migration.name.clone());
            if state.failing.contains(&migration.name) {
                return Err(PgChangeError::execution(&migration.name, "simulated failure"));
            }

            let ledger = state.ledger.get_or_insert_with(BTreeMap::new);
            if ledger.contains_key(&migration.name) {
                return Err(PgChangeError::Database(format!(
                    "duplicate key value violates unique constraint: {}",
                    migration.name
                )));
            }
            ledger.insert(migration.name.clone(), Utc::now().naive_utc());
            Ok(())
        })
    }

    fn drop_ledger(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.state.lock().await.ledger = None;
            Ok(())
        })
    }
}

//! Reconciliation between the migrations directory and the ledger.

use std::collections::HashSet;

use tracing::warn;

use super::name::MigrationName;
use crate::error::{PgChangeError, Result};

/// Directory entries that are never migration candidates.
pub const README: &str = "README.md";

/// Whether a directory entry is exempt from being run.
pub fn is_exempt(file_name: &str) -> bool {
    file_name == README || file_name.starts_with('.')
}

/// The delta between what is on disk and what the ledger has recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Unapplied migrations in execution order.
    pub pending: Vec<MigrationName>,
    /// Names recorded in the ledger.
    pub applied: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Names in the ledger that have no file on disk.
pub fn drifted<'a>(on_disk: &[String], applied: &'a [String]) -> Vec<&'a str> {
    let present: HashSet<&str> = on_disk.iter().map(String::as_str).collect();
    applied
        .iter()
        .map(String::as_str)
        .filter(|name| !present.contains(name))
        .collect()
}

/// Compute the pending set.
///
/// Fails with [`PgChangeError::Drift`] when the ledger references a file
/// that no longer exists; nothing should run in that case.
pub fn plan(on_disk: &[String], applied: &[String]) -> Result<Plan> {
    let missing = drifted(on_disk, applied);
    if !missing.is_empty() {
        return Err(PgChangeError::Drift {
            missing: missing.into_iter().map(str::to_string).collect(),
        });
    }

    let executed: HashSet<&str> = applied.iter().map(String::as_str).collect();
    let mut pending: Vec<MigrationName> = on_disk
        .iter()
        .filter(|name| !executed.contains(name.as_str()))
        .filter(|name| !is_exempt(name))
        .map(MigrationName::parse)
        .collect();

    for name in pending.iter().filter(|n| n.timestamp().is_none()) {
        warn!(
            "Migration {} has no timestamp prefix; it will run after timestamped migrations",
            name
        );
    }

    pending.sort();

    Ok(Plan {
        pending,
        applied: applied.to_vec(),
    })
}

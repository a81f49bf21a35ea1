//! Migration file naming.
//!
//! Files are named `<unix_ms>_<label>.<ext>`. The timestamp prefix is what
//! orders migrations; names without one are still accepted and run last.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::error::{PgChangeError, Result};

/// Extension given to scaffolded migrations.
pub const MIGRATION_EXTENSION: &str = "sql";

static TIMESTAMPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_(.+)\.[^.]+$").expect("migration name pattern is valid"));

/// A migration file name with its parsed ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MigrationName {
    file_name: String,
    timestamp: Option<u64>,
    label: Option<String>,
}

impl MigrationName {
    /// Parse a file name. Never fails: unrecognised names carry no timestamp.
    pub fn parse(file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let (timestamp, label) = match TIMESTAMPED.captures(&file_name) {
            Some(caps) => match caps[1].parse::<u64>() {
                Ok(ts) => (Some(ts), Some(caps[2].to_string())),
                Err(_) => (None, None),
            },
            None => (None, None),
        };

        Self {
            file_name,
            timestamp,
            label,
        }
    }

    /// Build the file name for a new migration.
    pub fn scaffold(timestamp_ms: u64, label: &str) -> Result<Self> {
        validate_label(label)?;
        Ok(Self::parse(format!(
            "{}_{}.{}",
            timestamp_ms,
            label.trim(),
            MIGRATION_EXTENSION
        )))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Ord for MigrationName {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.timestamp, other.timestamp) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.file_name.cmp(&other.file_name))
    }
}

impl PartialOrd for MigrationName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MigrationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

fn has_path_component(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value == "." || value == ".."
}

/// Check a label passed to `create`.
pub fn validate_label(label: &str) -> Result<()> {
    let label = label.trim();
    if label.is_empty() {
        return Err(PgChangeError::InvalidArgument(
            "Please provide a migration name.".into(),
        ));
    }
    if has_path_component(label) {
        return Err(PgChangeError::InvalidArgument(format!(
            "Migration name must not contain path separators: {}",
            label
        )));
    }
    Ok(())
}

/// Check a migration file name passed to `run`.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PgChangeError::InvalidArgument(
            "Please provide a migration name.".into(),
        ));
    }
    if has_path_component(name) {
        return Err(PgChangeError::InvalidArgument(format!(
            "Migration name must be a file name inside the migrations directory: {}",
            name
        )));
    }
    Ok(())
}

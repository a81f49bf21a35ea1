use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PgChangeError, Result};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Migration directory and ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Directory holding migration files, relative to the working directory.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Ledger table name, optionally schema-qualified.
    #[serde(default)]
    pub table: LedgerTable,

    /// Run each migration and its ledger insert in one transaction.
    #[serde(default = "default_transactional")]
    pub transactional: bool,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            table: LedgerTable::default(),
            transactional: default_transactional(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_transactional() -> bool {
    true
}

/// A validated ledger table identifier.
///
/// Only plain identifiers are accepted so the name can be interpolated
/// into DDL after quoting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedgerTable {
    schema: Option<String>,
    name: String,
}

impl LedgerTable {
    /// The default ledger table name.
    pub const DEFAULT: &'static str = "pg_migrations";

    /// Parse `table` or `schema.table`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid =
            || PgChangeError::Config(format!("Invalid ledger table name: {:?}", raw));

        let mut parts = raw.split('.');
        let first = parts.next().ok_or_else(invalid)?;
        let second = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let (schema, name) = match second {
            Some(name) => (Some(first), name),
            None => (None, first),
        };

        if !IDENTIFIER.is_match(name) || schema.is_some_and(|s| !IDENTIFIER.is_match(s)) {
            return Err(invalid());
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    /// The identifier, double-quoted for interpolation into SQL.
    pub fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("\"{}\".\"{}\"", schema, self.name),
            None => format!("\"{}\"", self.name),
        }
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self {
            schema: None,
            name: Self::DEFAULT.to_string(),
        }
    }
}

impl fmt::Display for LedgerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl TryFrom<String> for LedgerTable {
    type Error = PgChangeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<LedgerTable> for String {
    fn from(table: LedgerTable) -> Self {
        table.to_string()
    }
}

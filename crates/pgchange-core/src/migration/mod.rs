//! Migration scripts and the reconciliation plan.

mod name;
mod plan;
mod sql;

pub use name::{validate_file_name, validate_label, MigrationName, MIGRATION_EXTENSION};
pub use plan::{drifted, is_exempt, plan, Plan, README};
pub use sql::split_statements;

/// A migration script loaded from disk.
#[derive(Debug, Clone)]
pub struct Migration {
    /// File name, which is also the ledger key.
    pub name: String,
    /// SQL body.
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }

    /// The body split into executable statements.
    pub fn statements(&self) -> Vec<String> {
        split_statements(&self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_new() {
        let m = Migration::new("1_test.sql", "SELECT 1");
        assert_eq!(m.name, "1_test.sql");
        assert_eq!(m.sql, "SELECT 1");
    }

    #[test]
    fn test_migration_statements() {
        let m = Migration::new(
            "1724709481967_foo.sql",
            "CREATE TABLE users (id SERIAL PRIMARY KEY);\nCREATE INDEX users_id ON users (id);\n",
        );
        assert_eq!(m.statements().len(), 2);
    }
}

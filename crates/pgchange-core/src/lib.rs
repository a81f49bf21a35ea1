pub mod config;
pub mod error;
pub mod migration;

pub use config::{DatabaseConfig, LedgerTable, MigrationsConfig, PgChangeConfig};
pub use error::{PgChangeError, Result};
pub use migration::{Migration, MigrationName, Plan};

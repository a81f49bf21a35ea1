mod directory;
mod reconciler;
mod store;
mod template;

pub use directory::MigrationDirectory;
pub use reconciler::{MigrationStatus, Reconciler};
pub use store::{LedgerEntry, LedgerStore, PgLedgerStore, StoreFuture};

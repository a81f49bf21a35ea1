//! Testing utilities for pgchange.
//!
//! Provides an in-memory ledger so reconciliation can be exercised without
//! a PostgreSQL server.

mod memory;

pub use memory::MemoryLedgerStore;

//! Ledger Store module
//!
//! Persistence layer for transactions and ledger entries.
//! Provides atomic multi-row writes under serializable isolation and an
//! exclusive lock on a single transaction record.

mod error;
mod repository;

pub use error::StoreError;
pub use repository::{LedgerStore, TransactionFilter};

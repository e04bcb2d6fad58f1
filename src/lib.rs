//! token_ledger Library
//!
//! Re-exports modules for integration testing and external use.

pub mod analytics;
pub mod api;
pub mod balance;
pub mod domain;
pub mod engine;
pub mod notifier;
pub mod store;
pub mod worker;

// Private modules (used only by the server binary)
pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{Amount, AmountError, DomainEvent, LedgerEntry, Transaction};
pub use domain::{EntryType, TransactionStatus, TransactionType};
pub use error::{AppError, AppResult};

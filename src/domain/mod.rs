//! Domain module
//!
//! Core domain types for the transaction ledger.

pub mod amount;
pub mod events;
pub mod ledger_entry;
pub mod transaction;

pub use amount::{parse_fee, Amount, AmountError};
pub use events::DomainEvent;
pub use ledger_entry::{EntryType, LedgerEntry};
pub use transaction::{Transaction, TransactionStatus, TransactionType};

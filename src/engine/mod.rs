//! Transaction Engine
//!
//! Orchestrates the transaction lifecycle: idempotent creation, serializable
//! processing into double-entry ledger postings, and read-only verification.
//! Collaborators (ledger store, balance service, event notifier) are injected
//! through the constructor.

mod commands;
mod create;
mod postings;
mod process;
mod verify;


pub use commands::CreateTransactionCommand;
pub use postings::{posting_plan, PostingLeg};
pub use verify::{entries_balance, verify_entries};

use crate::balance::BalanceService;
use crate::notifier::EventNotifier;
use crate::store::LedgerStore;

/// Default bound on serialization-conflict retries during processing
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The transaction engine
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    store: LedgerStore,
    balances: BalanceService,
    notifier: EventNotifier,
    max_retries: u32,
}

impl TransactionEngine {
    pub fn new(store: LedgerStore, balances: BalanceService, notifier: EventNotifier) -> Self {
        Self {
            store,
            balances,
            notifier,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn balances(&self) -> &BalanceService {
        &self.balances
    }
}

//! Posting plan synthesis
//!
//! Maps a transaction type to the ledger legs it produces:
//!
//! | type       | entries                              |
//! |------------|--------------------------------------|
//! | transfer   | debit(from), credit(to)              |
//! | mint       | credit(to)                           |
//! | burn       | debit(from)                          |
//! | deposit    | credit(to)                           |
//! | withdrawal | debit(from)                          |
//!
//! A transfer's paired legs carry the same amount, so its debits and
//! credits always sum equal. Single-leg types are one-sided by design
//! (the counterparty is outside the ledger).

use crate::domain::{EntryType, Transaction, TransactionType};
use crate::error::AppError;

/// One leg of a posting: which account gets debited or credited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLeg {
    pub account_address: String,
    pub entry_type: EntryType,
}

impl PostingLeg {
    fn debit(account: &str) -> Self {
        Self {
            account_address: account.to_string(),
            entry_type: EntryType::Debit,
        }
    }

    fn credit(account: &str) -> Self {
        Self {
            account_address: account.to_string(),
            entry_type: EntryType::Credit,
        }
    }
}

/// Synthesize the posting legs for a transaction.
///
/// Address presence is validated at create time; a missing address here
/// means the row was corrupted or written outside the engine.
pub fn posting_plan(transaction: &Transaction) -> Result<Vec<PostingLeg>, AppError> {
    let from = transaction.from_address.as_deref();
    let to = transaction.to_address.as_deref();

    let missing = |side: &str| {
        AppError::Internal(format!(
            "Transaction {} ({}) is missing its {} address",
            transaction.id, transaction.tx_type, side
        ))
    };

    let legs = match transaction.tx_type {
        TransactionType::Transfer => {
            let from = from.ok_or_else(|| missing("from"))?;
            let to = to.ok_or_else(|| missing("to"))?;
            vec![PostingLeg::debit(from), PostingLeg::credit(to)]
        }
        TransactionType::Mint | TransactionType::Deposit => {
            let to = to.ok_or_else(|| missing("to"))?;
            vec![PostingLeg::credit(to)]
        }
        TransactionType::Burn | TransactionType::Withdrawal => {
            let from = from.ok_or_else(|| missing("from"))?;
            vec![PostingLeg::debit(from)]
        }
    };

    Ok(legs)
}

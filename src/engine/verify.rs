//! Ledger verification
//!
//! Read-only integrity check: re-sums a transaction's debit and credit
//! entries independently with exact decimal arithmetic. This is how an
//! external auditor confirms the ledger without trusting cached balances.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{EntryType, LedgerEntry, Transaction, TransactionType};
use crate::error::{AppError, AppResult};

use super::TransactionEngine;

/// Independent sums of a transaction's debit and credit entries
fn sum_sides(entries: &[LedgerEntry]) -> (Decimal, Decimal) {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;

    for entry in entries {
        match entry.entry_type {
            EntryType::Debit => debits += entry.amount,
            EntryType::Credit => credits += entry.amount,
        }
    }

    (debits, credits)
}

/// True iff the entries' debit and credit sums are exactly equal.
pub fn entries_balance(entries: &[LedgerEntry]) -> bool {
    let (debits, credits) = sum_sides(entries);
    debits == credits
}

/// Check a transaction's entries against the sums its posting rules demand.
///
/// A transfer balances internally: Σ debits == Σ credits. Single-leg types
/// are one-sided by design (the counterparty is outside the ledger), so
/// their check is that the present side sums to the transaction amount and
/// the absent side sums to zero. A pending transaction with no entries is
/// vacuously valid.
pub fn verify_entries(transaction: &Transaction, entries: &[LedgerEntry]) -> bool {
    if entries.is_empty() {
        return true;
    }

    let (debits, credits) = sum_sides(entries);

    match transaction.tx_type {
        TransactionType::Transfer => debits == credits,
        TransactionType::Mint | TransactionType::Deposit => {
            debits == Decimal::ZERO && credits == transaction.amount
        }
        TransactionType::Burn | TransactionType::Withdrawal => {
            credits == Decimal::ZERO && debits == transaction.amount
        }
    }
}

impl TransactionEngine {
    /// Verify a transaction's double-entry balance.
    ///
    /// No side effects. An imbalance indicates a bug in posting logic,
    /// not a runtime condition: it is logged at error severity and
    /// surfaced as `false`, never auto-corrected.
    pub async fn verify(&self, id: Uuid) -> AppResult<bool> {
        let transaction = self
            .store()
            .get_transaction(id)
            .await?
            .ok_or(AppError::NotFound(id))?;

        let entries = self.store().entries_for_transaction(id).await?;
        let valid = verify_entries(&transaction, &entries);

        if !valid {
            tracing::error!(
                transaction_id = %id,
                entry_count = entries.len(),
                "LEDGER IMBALANCE: debit and credit sums differ"
            );
        }

        Ok(valid)
    }
}

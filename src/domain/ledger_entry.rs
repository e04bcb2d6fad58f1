//! Ledger entry type
//!
//! One side of a double-entry posting. Entries are immutable once written;
//! the store exposes no update or delete path for them. The full set of
//! entries is the system of record for balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Debit or credit side of a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "debit",
            EntryType::Credit => "credit",
        }
    }

    /// Sign of this entry when summing a balance (credits add, debits subtract)
    pub fn sign(&self) -> Decimal {
        match self {
            EntryType::Debit => Decimal::NEGATIVE_ONE,
            EntryType::Credit => Decimal::ONE,
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(EntryType::Debit),
            "credit" => Ok(EntryType::Credit),
            other => Err(format!("Unknown entry type: {}", other)),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable ledger row
///
/// `balance_before` / `balance_after` are audit snapshots taken at write
/// time; balance derivation always recomputes from entry amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub account_address: String,
    pub token_address: String,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        transaction_id: Uuid,
        account_address: String,
        token_address: String,
        entry_type: EntryType,
        amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            account_address,
            token_address,
            entry_type,
            amount,
            balance_before,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

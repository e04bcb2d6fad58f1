//! Command definitions
//!
//! Commands represent already-validated requests handed to the engine.

use serde::{Deserialize, Serialize};

use crate::domain::TransactionType;

/// Command to create a new transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionCommand {
    /// Caller-supplied idempotency key, globally unique
    pub hash: String,
    pub tx_type: TransactionType,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    /// Amount as a string for precise decimal parsing
    pub amount: String,
    pub token_address: String,
    /// Fee as a string, defaults to zero when absent
    pub fee: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateTransactionCommand {
    pub fn new(
        hash: impl Into<String>,
        tx_type: TransactionType,
        amount: impl Into<String>,
        token_address: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            tx_type,
            from_address: None,
            to_address: None,
            amount: amount.into(),
            token_address: token_address.into(),
            fee: None,
            metadata: None,
        }
    }

    pub fn with_from(mut self, from_address: impl Into<String>) -> Self {
        self.from_address = Some(from_address.into());
        self
    }

    pub fn with_to(mut self, to_address: impl Into<String>) -> Self {
        self.to_address = Some(to_address.into());
        self
    }

    pub fn with_fee(mut self, fee: impl Into<String>) -> Self {
        self.fee = Some(fee.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

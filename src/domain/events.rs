//! Domain events
//!
//! Events published by the engine after a transaction is committed.
//! Delivery is best-effort; subscribers (webhook dispatch, analytics)
//! must tolerate missed events and re-derive from the ledger.

use serde::{Deserialize, Serialize};

use super::Transaction;

/// Event published to external subscribers, carrying a full snapshot
/// of the transaction at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "transaction")]
pub enum DomainEvent {
    #[serde(rename = "transaction.created")]
    TransactionCreated(Transaction),

    #[serde(rename = "transaction.completed")]
    TransactionCompleted(Transaction),
}

impl DomainEvent {
    /// Event name as seen by subscribers
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::TransactionCreated(_) => "transaction.created",
            DomainEvent::TransactionCompleted(_) => "transaction.completed",
        }
    }

    /// The transaction snapshot this event carries
    pub fn transaction(&self) -> &Transaction {
        match self {
            DomainEvent::TransactionCreated(tx) => tx,
            DomainEvent::TransactionCompleted(tx) => tx,
        }
    }
}

//! Transaction creation
//!
//! Creation is idempotent on the caller-supplied hash: the duplicate check
//! and the insert share one atomic unit of work, and a unique constraint on
//! the hash column backstops the race where two creates slip past the check.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    parse_fee, Amount, DomainEvent, Transaction, TransactionStatus, TransactionType,
};
use crate::error::{AppError, AppResult};

use super::{CreateTransactionCommand, TransactionEngine};

/// Check that the addresses a type requires are present, and that the
/// ones it forbids are absent.
fn validate_addresses(command: &CreateTransactionCommand) -> Result<(), AppError> {
    let tx_type = command.tx_type;

    if tx_type.requires_from() && command.from_address.is_none() {
        return Err(AppError::InvalidRequest(format!(
            "{} requires a from_address",
            tx_type
        )));
    }
    if !tx_type.requires_from() && command.from_address.is_some() {
        return Err(AppError::InvalidRequest(format!(
            "{} must not have a from_address",
            tx_type
        )));
    }
    if tx_type.requires_to() && command.to_address.is_none() {
        return Err(AppError::InvalidRequest(format!(
            "{} requires a to_address",
            tx_type
        )));
    }
    if !tx_type.requires_to() && command.to_address.is_some() {
        return Err(AppError::InvalidRequest(format!(
            "{} must not have a to_address",
            tx_type
        )));
    }

    if tx_type == TransactionType::Transfer && command.from_address == command.to_address {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to the same address".to_string(),
        ));
    }

    if command.hash.trim().is_empty() {
        return Err(AppError::InvalidRequest("hash must not be empty".to_string()));
    }
    if command.token_address.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "token_address must not be empty".to_string(),
        ));
    }

    Ok(())
}

impl TransactionEngine {
    /// Create a new pending transaction.
    ///
    /// The balance check for transfers is advisory: a fast-fail on an
    /// obviously unfunded request. The authoritative check happens again
    /// at process time under serializable isolation, because the balance
    /// may change between create and process.
    pub async fn create(&self, command: CreateTransactionCommand) -> AppResult<Transaction> {
        validate_addresses(&command)?;

        let amount: Amount = command.amount.parse()?;
        let fee = parse_fee(command.fee.as_deref())?;

        if command.tx_type == TransactionType::Transfer {
            let from = command
                .from_address
                .as_deref()
                .expect("validated: transfer has from_address");
            let available = self
                .balances()
                .get_balance(from, &command.token_address)
                .await?;
            if available < amount.value() {
                return Err(AppError::InsufficientBalance {
                    required: amount.value(),
                    available,
                });
            }
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            hash: command.hash,
            tx_type: command.tx_type,
            status: TransactionStatus::Pending,
            from_address: command.from_address,
            to_address: command.to_address,
            amount: amount.value(),
            token_address: command.token_address,
            fee,
            failure_reason: None,
            metadata: command.metadata,
            created_at: Utc::now(),
            confirmed_at: None,
        };

        let mut unit = self.store().begin().await?;

        if let Some(existing) = self.store().find_by_hash(&mut unit, &transaction.hash).await? {
            tracing::debug!(
                hash = %transaction.hash,
                existing_id = %existing,
                "Rejected duplicate transaction hash"
            );
            return Err(AppError::DuplicateTransaction(transaction.hash));
        }

        self.store().insert_transaction(&mut unit, &transaction).await?;
        self.store().commit(unit).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            tx_type = transaction.tx_type.as_str(),
            token = %transaction.token_address,
            amount = %transaction.amount,
            "Transaction created"
        );

        // Best-effort, after commit: a publish failure must never make a
        // committed transaction look failed.
        self.notifier
            .publish(DomainEvent::TransactionCreated(transaction.clone()));

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_requires_both_addresses() {
        let cmd = CreateTransactionCommand::new("0x1", TransactionType::Transfer, "10", "0xtoken")
            .with_from("0xa");
        assert!(matches!(
            validate_addresses(&cmd),
            Err(AppError::InvalidRequest(_))
        ));

        let cmd = cmd.with_to("0xb");
        assert!(validate_addresses(&cmd).is_ok());
    }

    #[test]
    fn test_mint_forbids_from_address() {
        let cmd = CreateTransactionCommand::new("0x2", TransactionType::Mint, "10", "0xtoken")
            .with_to("0xb")
            .with_from("0xa");
        assert!(matches!(
            validate_addresses(&cmd),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_burn_forbids_to_address() {
        let cmd = CreateTransactionCommand::new("0x3", TransactionType::Burn, "10", "0xtoken")
            .with_from("0xa")
            .with_to("0xb");
        assert!(matches!(
            validate_addresses(&cmd),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_same_address_transfer_rejected() {
        let cmd = CreateTransactionCommand::new("0x4", TransactionType::Transfer, "10", "0xtoken")
            .with_from("0xa")
            .with_to("0xa");
        assert!(matches!(
            validate_addresses(&cmd),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_empty_hash_rejected() {
        let cmd = CreateTransactionCommand::new("  ", TransactionType::Mint, "10", "0xtoken")
            .with_to("0xb");
        assert!(matches!(
            validate_addresses(&cmd),
            Err(AppError::InvalidRequest(_))
        ));
    }
}

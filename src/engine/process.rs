//! Transaction processing
//!
//! The one operation where transient races are unacceptable. The whole
//! write sequence runs in a single SERIALIZABLE unit of work with an
//! exclusive lock on the transaction row:
//!
//!   lock row -> status gate -> processing -> derive balances ->
//!   insert entries -> completed -> commit
//!
//! Either everything commits or nothing does. Serialization aborts are
//! contention signals, retried with backoff up to a bound; any other
//! posting failure aborts the unit and is recorded as a terminal failure
//! in a separate write.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{DomainEvent, EntryType, LedgerEntry, Transaction, TransactionStatus};
use crate::error::{AppError, AppResult};

use super::{posting_plan, TransactionEngine};

/// Cache writes carried out of the committed unit
struct PostedBalances {
    updates: Vec<(String, Decimal)>,
}

impl TransactionEngine {
    /// Process a pending transaction into its ledger postings.
    ///
    /// Idempotent under at-least-once job delivery: a redelivery after
    /// completion observes `status != pending` under the row lock and
    /// fails with `InvalidState` without touching the ledger.
    pub async fn process(&self, id: Uuid) -> AppResult<Transaction> {
        for attempt in 0..self.max_retries {
            match self.try_process(id).await {
                Err(AppError::StorageConflict) if attempt + 1 < self.max_retries => {
                    let jitter = rand::thread_rng().gen_range(0..25u64);
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1) + jitter);
                    tracing::warn!(
                        transaction_id = %id,
                        attempt = attempt + 1,
                        max = self.max_retries,
                        "Serialization conflict while processing, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }

        Err(AppError::StorageConflict)
    }

    /// One processing attempt: a single serializable unit of work
    async fn try_process(&self, id: Uuid) -> AppResult<Transaction> {
        let mut unit = self.store().begin_serializable().await?;

        // Exclusive lock before reading the status: a concurrent processor
        // of the same id blocks here until this unit ends.
        let transaction = self
            .store()
            .find_by_id_for_update(&mut unit, id)
            .await?
            .ok_or(AppError::NotFound(id))?;

        if !transaction.status.can_process() {
            return Err(AppError::InvalidState {
                id,
                status: transaction.status.to_string(),
            });
        }

        self.store().set_processing(&mut unit, id).await?;

        let posted = match self.post_entries(&mut unit, &transaction).await {
            Ok(posted) => posted,
            Err(err) if err.is_retryable() => return Err(err),
            Err(err) => {
                // Abort the unit (rollback on drop), then record the terminal
                // failure outside it.
                drop(unit);
                let reason = err.to_string();
                tracing::warn!(
                    transaction_id = %id,
                    reason = %reason,
                    "Posting failed, marking transaction failed"
                );
                self.store().mark_failed(id, &reason).await?;
                return Err(err);
            }
        };

        let confirmed_at = Utc::now();
        self.store().mark_completed(&mut unit, id, confirmed_at).await?;
        self.store().commit(unit).await?;

        // Cache updates and the completion event happen only after commit.
        for (account, balance_after) in posted.updates {
            self.balances()
                .update_balance(&account, &transaction.token_address, balance_after)
                .await;
        }

        let completed = Transaction {
            status: TransactionStatus::Completed,
            confirmed_at: Some(confirmed_at),
            ..transaction
        };

        tracing::info!(
            transaction_id = %completed.id,
            tx_type = completed.tx_type.as_str(),
            token = %completed.token_address,
            amount = %completed.amount,
            "Transaction completed"
        );

        self.notifier
            .publish(DomainEvent::TransactionCompleted(completed.clone()));

        Ok(completed)
    }

    /// Synthesize and insert the ledger entries for a transaction inside
    /// the current unit of work. Balances are derived from the ledger at
    /// the moment of posting; the snapshots land on the entries.
    async fn post_entries(
        &self,
        unit: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: &Transaction,
    ) -> AppResult<PostedBalances> {
        let legs = posting_plan(transaction)?;
        let amount = transaction.amount;

        let mut entries = Vec::with_capacity(legs.len());
        let mut updates = Vec::with_capacity(legs.len());

        for leg in legs {
            let balance_before = self
                .store()
                .sum_entries_in_tx(unit, &leg.account_address, &transaction.token_address)
                .await?;

            // The authoritative overdraft check: under serializable
            // isolation one of two conflicting transfers aborts instead
            // of both committing.
            if leg.entry_type == EntryType::Debit && balance_before < amount {
                return Err(AppError::InsufficientBalance {
                    required: amount,
                    available: balance_before,
                });
            }

            let balance_after = match leg.entry_type {
                EntryType::Credit => balance_before + amount,
                EntryType::Debit => balance_before - amount,
            };

            entries.push(LedgerEntry::new(
                transaction.id,
                leg.account_address.clone(),
                transaction.token_address.clone(),
                leg.entry_type,
                amount,
                balance_before,
                balance_after,
            ));
            updates.push((leg.account_address, balance_after));
        }

        self.store().insert_entries(unit, &entries).await?;

        Ok(PostedBalances { updates })
    }
}

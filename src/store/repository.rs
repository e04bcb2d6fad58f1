//! Ledger Store Repository
//!
//! PostgreSQL persistence for transactions and ledger entries.
//!
//! The consistency contract this repository provides to the engine:
//! - `begin_serializable` opens a unit of work at SERIALIZABLE isolation;
//!   either every write in it commits or none do.
//! - `find_by_id_for_update` takes an exclusive row lock held until the
//!   unit of work ends, so two processors of the same transaction serialize.
//! - Ledger entries are insert-only; no update or delete path exists.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction as DbTransaction};
use uuid::Uuid;

use crate::domain::{EntryType, LedgerEntry, Transaction, TransactionStatus, TransactionType};

use super::StoreError;

/// Raw transaction row tuple, mapped to the domain type after fetch
type TransactionRow = (
    Uuid,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Decimal,
    String,
    Decimal,
    Option<String>,
    Option<serde_json::Value>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const TRANSACTION_COLUMNS: &str = "id, hash, tx_type, status, from_address, to_address, \
     amount, token_address, fee, failure_reason, metadata, created_at, confirmed_at";

fn row_to_transaction(row: TransactionRow) -> Result<Transaction, StoreError> {
    let (
        id,
        hash,
        tx_type,
        status,
        from_address,
        to_address,
        amount,
        token_address,
        fee,
        failure_reason,
        metadata,
        created_at,
        confirmed_at,
    ) = row;

    Ok(Transaction {
        id,
        hash,
        tx_type: tx_type.parse().map_err(StoreError::InvalidRow)?,
        status: status.parse().map_err(StoreError::InvalidRow)?,
        from_address,
        to_address,
        amount,
        token_address,
        fee,
        failure_reason,
        metadata,
        created_at,
        confirmed_at,
    })
}

/// Filters for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Matches either side of the movement (from or to)
    pub address: Option<String>,
    pub token_address: Option<String>,
    pub tx_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    /// 1-based page number
    pub page: i64,
    pub limit: i64,
}

impl TransactionFilter {
    pub fn offset(&self) -> i64 {
        let page = self.page.max(1);
        (page - 1) * self.effective_limit()
    }

    pub fn effective_limit(&self) -> i64 {
        if self.limit <= 0 {
            20
        } else {
            self.limit.min(100)
        }
    }
}

/// Ledger Store over PostgreSQL
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    /// Create a new LedgerStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a unit of work at the pool's default isolation level
    pub async fn begin(&self) -> Result<DbTransaction<'static, Postgres>, StoreError> {
        self.pool.begin().await.map_err(StoreError::from_sqlx)
    }

    /// Begin a unit of work at SERIALIZABLE isolation.
    /// Used for the processing write sequence where transient races
    /// are unacceptable (double-spend risk).
    pub async fn begin_serializable(
        &self,
    ) -> Result<DbTransaction<'static, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from_sqlx)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(tx)
    }

    /// Commit a unit of work, mapping serialization aborts at commit time
    pub async fn commit(&self, tx: DbTransaction<'static, Postgres>) -> Result<(), StoreError> {
        tx.commit().await.map_err(StoreError::from_sqlx)
    }

    // =========================================================================
    // Transaction rows
    // =========================================================================

    /// Look up a transaction id by its idempotency hash, inside a unit of work
    pub async fn find_by_hash(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        hash: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM transactions WHERE hash = $1")
            .bind(hash)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(id)
    }

    /// Insert a new transaction row. A unique violation on `hash` maps to
    /// `DuplicateHash` so a create racing with itself stays idempotent.
    pub async fn insert_transaction(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, hash, tx_type, status, from_address, to_address,
                amount, token_address, fee, failure_reason, metadata,
                created_at, confirmed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(transaction.id)
        .bind(&transaction.hash)
        .bind(transaction.tx_type.as_str())
        .bind(transaction.status.as_str())
        .bind(&transaction.from_address)
        .bind(&transaction.to_address)
        .bind(transaction.amount)
        .bind(&transaction.token_address)
        .bind(transaction.fee)
        .bind(&transaction.failure_reason)
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .bind(transaction.confirmed_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.is_unique_violation() {
                    return StoreError::DuplicateHash(transaction.hash.clone());
                }
            }
            StoreError::from_sqlx(e)
        })?;

        Ok(())
    }

    /// Fetch a transaction with an exclusive row lock (`SELECT ... FOR UPDATE`).
    /// The lock is held until the unit of work commits or aborts.
    pub async fn find_by_id_for_update(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Transaction>, StoreError> {
        let query = format!(
            "SELECT {} FROM transactions WHERE id = $1 FOR UPDATE",
            TRANSACTION_COLUMNS
        );

        let row: Option<TransactionRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        row.map(row_to_transaction).transpose()
    }

    /// Transition a locked transaction to processing
    pub async fn set_processing(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE transactions SET status = 'processing' WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    /// Mark a transaction completed, stamping `confirmed_at`
    pub async fn mark_completed(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transactions SET status = 'completed', confirmed_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(confirmed_at)
        .execute(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    /// Record a terminal failure with its reason.
    ///
    /// Runs on the pool, not inside the aborted posting unit: the unit that
    /// failed cannot contain its own abort record.
    pub async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transactions SET status = 'failed', failure_reason = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(())
    }

    /// Fetch a transaction by id
    pub async fn get_transaction(&self, id: Uuid) -> Result<Option<Transaction>, StoreError> {
        let query = format!(
            "SELECT {} FROM transactions WHERE id = $1",
            TRANSACTION_COLUMNS
        );

        let row: Option<TransactionRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        row.map(row_to_transaction).transpose()
    }

    /// List transactions newest-first with optional filters and pagination
    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, StoreError> {
        let query = format!(
            r#"
            SELECT {} FROM transactions
            WHERE ($1::text IS NULL OR from_address = $1 OR to_address = $1)
              AND ($2::text IS NULL OR token_address = $2)
              AND ($3::text IS NULL OR tx_type = $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR created_at >= $5)
              AND ($6::timestamptz IS NULL OR created_at <= $6)
            ORDER BY created_at DESC
            LIMIT $7 OFFSET $8
            "#,
            TRANSACTION_COLUMNS
        );

        let rows: Vec<TransactionRow> = sqlx::query_as(&query)
            .bind(&filter.address)
            .bind(&filter.token_address)
            .bind(filter.tx_type.map(|t| t.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.from_date)
            .bind(filter.to_date)
            .bind(filter.effective_limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;

        rows.into_iter().map(row_to_transaction).collect()
    }

    // =========================================================================
    // Ledger entries
    // =========================================================================

    /// Insert ledger entries as part of a unit of work. Entries are
    /// append-only; this is the only write path that touches them.
    pub async fn insert_entries(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        entries: &[LedgerEntry],
    ) -> Result<(), StoreError> {
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    id, transaction_id, account_address, token_address,
                    entry_type, amount, balance_before, balance_after, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(entry.id)
            .bind(entry.transaction_id)
            .bind(&entry.account_address)
            .bind(&entry.token_address)
            .bind(entry.entry_type.as_str())
            .bind(entry.amount)
            .bind(entry.balance_before)
            .bind(entry.balance_after)
            .bind(entry.created_at)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::from_sqlx)?;
        }

        Ok(())
    }

    /// All ledger entries for one transaction, in insertion order
    pub async fn entries_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows: Vec<(
            Uuid,
            Uuid,
            String,
            String,
            String,
            Decimal,
            Decimal,
            Decimal,
            DateTime<Utc>,
        )> = sqlx::query_as(
            r#"
            SELECT id, transaction_id, account_address, token_address,
                   entry_type, amount, balance_before, balance_after, created_at
            FROM ledger_entries
            WHERE transaction_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        rows.into_iter()
            .map(
                |(
                    id,
                    transaction_id,
                    account_address,
                    token_address,
                    entry_type,
                    amount,
                    balance_before,
                    balance_after,
                    created_at,
                )| {
                    Ok(LedgerEntry {
                        id,
                        transaction_id,
                        account_address,
                        token_address,
                        entry_type: entry_type
                            .parse::<EntryType>()
                            .map_err(StoreError::InvalidRow)?,
                        amount,
                        balance_before,
                        balance_after,
                        created_at,
                    })
                },
            )
            .collect()
    }

    /// Derive a balance from the ledger: Σ credits − Σ debits for the key
    pub async fn sum_entries(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END
            ), 0)
            FROM ledger_entries
            WHERE account_address = $1 AND token_address = $2
            "#,
        )
        .bind(account_address)
        .bind(token_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(balance.unwrap_or(Decimal::ZERO))
    }

    /// Same derivation inside a unit of work; under SERIALIZABLE isolation
    /// this read participates in conflict detection, which is what defends
    /// against two concurrent overdrafting transfers both committing.
    pub async fn sum_entries_in_tx(
        &self,
        tx: &mut DbTransaction<'_, Postgres>,
        account_address: &str,
        token_address: &str,
    ) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(
                CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END
            ), 0)
            FROM ledger_entries
            WHERE account_address = $1 AND token_address = $2
            "#,
        )
        .bind(account_address)
        .bind(token_address)
        .fetch_optional(&mut **tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(balance.unwrap_or(Decimal::ZERO))
    }
}

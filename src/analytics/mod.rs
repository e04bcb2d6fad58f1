//! Transaction analytics
//!
//! Read-only rollups over completed transactions for reporting. Consumes
//! the ledger after the fact and is not part of correctness-critical logic.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

/// One daily rollup row for a token
#[derive(Debug, Clone, Serialize)]
pub struct TokenAggregate {
    pub date: NaiveDate,
    pub tx_type: String,
    pub count: i64,
    pub volume: Decimal,
    pub fees: Decimal,
}

/// Analytics query service
#[derive(Debug, Clone)]
pub struct AnalyticsService {
    pool: PgPool,
}

impl AnalyticsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Daily per-type counts and volumes for a token over a date range
    pub async fn token_analytics(
        &self,
        token_address: &str,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<TokenAggregate>, sqlx::Error> {
        let rows: Vec<(NaiveDate, String, i64, Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT
                date_trunc('day', confirmed_at)::date AS day,
                tx_type,
                COUNT(*) AS count,
                COALESCE(SUM(amount), 0) AS volume,
                COALESCE(SUM(fee), 0) AS fees
            FROM transactions
            WHERE token_address = $1
              AND status = 'completed'
              AND ($2::timestamptz IS NULL OR confirmed_at >= $2)
              AND ($3::timestamptz IS NULL OR confirmed_at <= $3)
            GROUP BY day, tx_type
            ORDER BY day DESC, tx_type ASC
            "#,
        )
        .bind(token_address)
        .bind(from_date)
        .bind(to_date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(date, tx_type, count, volume, fees)| TokenAggregate {
                date,
                tx_type,
                count,
                volume,
                fees,
            })
            .collect())
    }
}

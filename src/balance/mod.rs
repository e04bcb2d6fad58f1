//! Balance Service
//!
//! Derives account balances from the ledger and caches them. The cache is
//! an optimization only: the single source of truth is always the sum of
//! ledger entries, and the cache is re-derivable at any time.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::store::{LedgerStore, StoreError};

type BalanceKey = (String, String);

/// Balance Service with a process-wide cache keyed by (account, token)
#[derive(Debug, Clone)]
pub struct BalanceService {
    store: LedgerStore,
    cache: Arc<RwLock<HashMap<BalanceKey, Decimal>>>,
}

impl BalanceService {
    pub fn new(store: LedgerStore) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the balance for (account, token).
    ///
    /// Returns the cached value if present, otherwise sums all ledger
    /// entries for the key (credits positive, debits negative) and fills
    /// the cache. Arithmetic is Decimal throughout.
    pub async fn get_balance(
        &self,
        account_address: &str,
        token_address: &str,
    ) -> Result<Decimal, StoreError> {
        let key = (account_address.to_string(), token_address.to_string());

        if let Some(balance) = self.cache.read().await.get(&key) {
            return Ok(*balance);
        }

        let balance = self.store.sum_entries(account_address, token_address).await?;

        self.cache.write().await.insert(key, balance);

        Ok(balance)
    }

    /// Write a freshly computed balance into the cache.
    ///
    /// Called by the engine right after a ledger posting, with the
    /// `balance_after` value it already computed, so no recomputation
    /// query is needed. Pure cache write; correctness never depends on it.
    pub async fn update_balance(
        &self,
        account_address: &str,
        token_address: &str,
        new_balance: Decimal,
    ) {
        let key = (account_address.to_string(), token_address.to_string());
        self.cache.write().await.insert(key, new_balance);
    }

    /// Drop a single cached entry
    pub async fn invalidate(&self, account_address: &str, token_address: &str) {
        let key = (account_address.to_string(), token_address.to_string());
        self.cache.write().await.remove(&key);
    }

    /// Drop all cached entries. Used for recovery and testing; the cache
    /// is always re-derivable from the ledger.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sqlx::postgres::PgPoolOptions;

    fn service() -> BalanceService {
        // Lazy pool: never connects unless a query runs, which these
        // cache-only tests avoid.
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/unused");
        BalanceService::new(LedgerStore::new(pool.unwrap()))
    }

    #[tokio::test]
    async fn test_update_then_get_uses_cache() {
        let svc = service();
        svc.update_balance("0xabc", "0xtoken", dec!(42.5)).await;

        let balance = svc.get_balance("0xabc", "0xtoken").await.unwrap();
        assert_eq!(balance, dec!(42.5));
    }

    #[tokio::test]
    async fn test_cache_keys_are_independent() {
        let svc = service();
        svc.update_balance("0xabc", "0xtoken_a", dec!(100)).await;
        svc.update_balance("0xabc", "0xtoken_b", dec!(7)).await;

        assert_eq!(svc.get_balance("0xabc", "0xtoken_a").await.unwrap(), dec!(100));
        assert_eq!(svc.get_balance("0xabc", "0xtoken_b").await.unwrap(), dec!(7));
    }

    #[tokio::test]
    async fn test_update_overwrites_cached_value() {
        let svc = service();
        svc.update_balance("0xabc", "0xtoken", dec!(10)).await;
        svc.update_balance("0xabc", "0xtoken", dec!(4)).await;

        assert_eq!(svc.get_balance("0xabc", "0xtoken").await.unwrap(), dec!(4));
    }
}

//! Common test utilities

#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use token_ledger::balance::BalanceService;
use token_ledger::engine::TransactionEngine;
use token_ledger::notifier::EventNotifier;
use token_ledger::store::LedgerStore;

/// Connect to the test database and ensure the schema exists.
///
/// Tests isolate by using fresh addresses/hashes rather than truncating,
/// so they can run in parallel against one database.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Serialize schema creation across parallel test binaries
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    sqlx::query("SELECT pg_advisory_lock(815101)")
        .execute(&mut *conn)
        .await
        .expect("Failed to take schema lock");

    let schema = include_str!("../../migrations/001_init.sql");
    for statement in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .expect("Failed to apply schema");
    }

    sqlx::query("SELECT pg_advisory_unlock(815101)")
        .execute(&mut *conn)
        .await
        .expect("Failed to release schema lock");

    pool
}

/// Build an engine wired to the given pool, dropping published events
pub fn test_engine(pool: &PgPool) -> TransactionEngine {
    let store = LedgerStore::new(pool.clone());
    let balances = BalanceService::new(store.clone());
    // Receiver is dropped; publish is best-effort and swallows that.
    let (notifier, _receiver) = EventNotifier::channel(64);
    TransactionEngine::new(store, balances, notifier)
}

/// Build an engine that keeps the event channel open, for tests that
/// assert on published domain events
pub fn test_engine_with_events(
    pool: &PgPool,
) -> (
    TransactionEngine,
    tokio::sync::mpsc::Receiver<token_ledger::DomainEvent>,
) {
    let store = LedgerStore::new(pool.clone());
    let balances = BalanceService::new(store.clone());
    let (notifier, receiver) = EventNotifier::channel(64);
    (TransactionEngine::new(store, balances, notifier), receiver)
}

/// A unique hex-looking identifier for addresses and hashes
pub fn unique_id(prefix: &str) -> String {
    format!("0x{}{}", prefix, uuid::Uuid::new_v4().simple())
}

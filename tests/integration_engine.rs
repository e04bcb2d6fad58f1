//! Integration tests for the transaction engine
//!
//! These tests require a database connection (DATABASE_URL).

use rust_decimal_macros::dec;
use uuid::Uuid;

use token_ledger::domain::{TransactionStatus, TransactionType};
use token_ledger::engine::CreateTransactionCommand;
use token_ledger::AppError;

mod common;

#[tokio::test]
async fn test_mint_then_transfer_scenario() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");
    let b = common::unique_id("b");

    // Mint 100 tokens to A
    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "100", &token)
                .with_to(&a),
        )
        .await
        .unwrap();
    assert_eq!(mint.status, TransactionStatus::Pending);

    let mint = engine.process(mint.id).await.unwrap();
    assert_eq!(mint.status, TransactionStatus::Completed);
    assert!(mint.confirmed_at.is_some());

    assert_eq!(engine.balances().get_balance(&a, &token).await.unwrap(), dec!(100));

    // Transfer 40 from A to B
    let transfer = engine
        .create(
            CreateTransactionCommand::new(
                common::unique_id("h"),
                TransactionType::Transfer,
                "40",
                &token,
            )
            .with_from(&a)
            .with_to(&b),
        )
        .await
        .unwrap();

    engine.process(transfer.id).await.unwrap();

    assert_eq!(engine.balances().get_balance(&a, &token).await.unwrap(), dec!(60));
    assert_eq!(engine.balances().get_balance(&b, &token).await.unwrap(), dec!(40));

    // Both transactions individually verify
    assert!(engine.verify(mint.id).await.unwrap());
    assert!(engine.verify(transfer.id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_hash_is_rejected() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let hash = common::unique_id("h");

    let cmd = CreateTransactionCommand::new(&hash, TransactionType::Mint, "10", &token)
        .with_to(common::unique_id("a"));

    let first = engine.create(cmd.clone()).await.unwrap();

    let second = engine.create(cmd).await;
    match second {
        Err(AppError::DuplicateTransaction(h)) => assert_eq!(h, hash),
        other => panic!("Expected DuplicateTransaction, got {:?}", other),
    }

    // Exactly one stored row for the hash
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE hash = $1")
        .bind(&hash)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let stored = engine.store().get_transaction(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_process_redelivery_is_a_safe_noop() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "50", &token)
                .with_to(&a),
        )
        .await
        .unwrap();

    engine.process(mint.id).await.unwrap();

    // Simulated queue redelivery
    let redelivery = engine.process(mint.id).await;
    match redelivery {
        Err(AppError::InvalidState { status, .. }) => assert_eq!(status, "completed"),
        other => panic!("Expected InvalidState, got {:?}", other),
    }

    // Exactly one set of ledger entries
    let entries = engine.store().entries_for_transaction(mint.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, dec!(50));
}

#[tokio::test]
async fn test_process_of_unknown_transaction_is_not_found() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let missing = Uuid::new_v4();
    assert!(matches!(
        engine.process(missing).await,
        Err(AppError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_overdraft_at_process_time_marks_failed() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");
    let b = common::unique_id("b");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "50", &token)
                .with_to(&a),
        )
        .await
        .unwrap();
    engine.process(mint.id).await.unwrap();

    // Both pass the advisory check (50 >= 40), but only the first can
    // survive the authoritative check during processing.
    let t1 = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Transfer, "40", &token)
                .with_from(&a)
                .with_to(&b),
        )
        .await
        .unwrap();
    let t2 = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Transfer, "40", &token)
                .with_from(&a)
                .with_to(&b),
        )
        .await
        .unwrap();

    engine.process(t1.id).await.unwrap();

    let result = engine.process(t2.id).await;
    assert!(matches!(result, Err(AppError::InsufficientBalance { .. })));

    // The failure is recorded terminally with a reason
    let failed = engine.store().get_transaction(t2.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TransactionStatus::Failed);
    assert!(failed.failure_reason.unwrap().contains("Insufficient balance"));

    // No partial entries survived the aborted posting unit
    let entries = engine.store().entries_for_transaction(t2.id).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_concurrent_transfers_never_overdraw() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");
    let b = common::unique_id("b");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "100", &token)
                .with_to(&a),
        )
        .await
        .unwrap();
    engine.process(mint.id).await.unwrap();

    // Two transfers, each > B/2 but <= B
    let t1 = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Transfer, "60", &token)
                .with_from(&a)
                .with_to(&b),
        )
        .await
        .unwrap();
    let t2 = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Transfer, "60", &token)
                .with_from(&a)
                .with_to(&b),
        )
        .await
        .unwrap();

    let (r1, r2) = tokio::join!(engine.process(t1.id), engine.process(t2.id));
    let successes = [r1.is_ok(), r2.is_ok()].iter().filter(|&&ok| ok).count();
    assert!(successes <= 1, "Both overdrafting transfers completed");

    // Final derived balance is never negative, independent of cache
    engine.balances().clear().await;
    let balance = engine.balances().get_balance(&a, &token).await.unwrap();
    assert!(balance >= dec!(0), "Account overdrawn: {}", balance);
    if successes == 1 {
        assert_eq!(balance, dec!(40));
    }
}

#[tokio::test]
async fn test_balance_derivation_matches_manual_ledger_sum() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");
    let b = common::unique_id("b");

    for (tx_type, amount, from, to) in [
        (TransactionType::Mint, "100", None, Some(&a)),
        (TransactionType::Mint, "25.5", None, Some(&a)),
        (TransactionType::Transfer, "30", Some(&a), Some(&b)),
        (TransactionType::Burn, "10", Some(&a), None),
        (TransactionType::Withdrawal, "5.5", Some(&a), None),
    ] {
        let mut cmd =
            CreateTransactionCommand::new(common::unique_id("h"), tx_type, amount, &token);
        if let Some(from) = from {
            cmd = cmd.with_from(from.as_str());
        }
        if let Some(to) = to {
            cmd = cmd.with_to(to.as_str());
        }
        let tx = engine.create(cmd).await.unwrap();
        engine.process(tx.id).await.unwrap();
    }

    // 100 + 25.5 - 30 - 10 - 5.5 = 80
    engine.balances().clear().await;
    assert_eq!(engine.balances().get_balance(&a, &token).await.unwrap(), dec!(80));
    assert_eq!(engine.balances().get_balance(&b, &token).await.unwrap(), dec!(30));

    // Cache state is irrelevant: the direct ledger sum agrees
    let manual = engine.store().sum_entries(&a, &token).await.unwrap();
    assert_eq!(manual, dec!(80));
}

#[tokio::test]
async fn test_verify_detects_corrupted_entry() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "100", &token)
                .with_to(&a),
        )
        .await
        .unwrap();
    engine.process(mint.id).await.unwrap();

    assert!(engine.verify(mint.id).await.unwrap());

    // Synthetically corrupt one side's amount in the fixture
    sqlx::query("UPDATE ledger_entries SET amount = amount + 1 WHERE transaction_id = $1")
        .bind(mint.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(!engine.verify(mint.id).await.unwrap());
}

#[tokio::test]
async fn test_worker_processes_enqueued_transaction() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "75", &token)
                .with_to(&a),
        )
        .await
        .unwrap();

    let (queue, receiver) = token_ledger::worker::JobQueue::channel(8);
    let worker = tokio::spawn(token_ledger::worker::run_worker(
        engine.clone(),
        queue.clone(),
        receiver,
    ));

    queue
        .enqueue(token_ledger::worker::Job::process(mint.id))
        .await
        .unwrap();

    // Poll until the worker has driven the transaction to completion
    let mut completed = false;
    for _ in 0..50 {
        let stored = engine.store().get_transaction(mint.id).await.unwrap().unwrap();
        if stored.status == TransactionStatus::Completed {
            completed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(completed, "Worker did not complete the transaction in time");

    // The worker holds its own requeue sender, so the channel never closes
    // from this side; stop it the way the server shutdown path does.
    worker.abort();
}

#[tokio::test]
async fn test_lifecycle_events_are_published() {
    let pool = common::setup_test_db().await;
    let (engine, mut events) = common::test_engine_with_events(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");

    let mint = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Mint, "10", &token)
                .with_to(&a),
        )
        .await
        .unwrap();
    engine.process(mint.id).await.unwrap();

    let created = events.recv().await.unwrap();
    assert_eq!(created.kind(), "transaction.created");
    assert_eq!(created.transaction().id, mint.id);
    assert_eq!(created.transaction().status, TransactionStatus::Pending);

    let completed = events.recv().await.unwrap();
    assert_eq!(completed.kind(), "transaction.completed");
    assert_eq!(completed.transaction().id, mint.id);
    assert_eq!(completed.transaction().status, TransactionStatus::Completed);
}

#[tokio::test]
async fn test_advisory_balance_check_at_create() {
    let pool = common::setup_test_db().await;
    let engine = common::test_engine(&pool);

    let token = common::unique_id("tok");
    let a = common::unique_id("a");
    let b = common::unique_id("b");

    // No funds at all: the advisory check fast-fails the create
    let result = engine
        .create(
            CreateTransactionCommand::new(common::unique_id("h"), TransactionType::Transfer, "10", &token)
                .with_from(&a)
                .with_to(&b),
        )
        .await;

    assert!(matches!(result, Err(AppError::InsufficientBalance { .. })));
}

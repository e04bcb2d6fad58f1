//! token_ledger - Transaction Ledger Engine
//!
//! Records value-movement events as immutable double-entry bookkeeping
//! records, enforces balance invariants under concurrent access, and
//! exposes a verifiable audit trail.

use std::net::SocketAddr;

use axum::{middleware, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_ledger::analytics::AnalyticsService;
use token_ledger::api::{self, AppState};
use token_ledger::balance::BalanceService;
use token_ledger::engine::TransactionEngine;
use token_ledger::notifier::{self, EventNotifier};
use token_ledger::store::LedgerStore;
use token_ledger::worker::{self, JobQueue};
use token_ledger::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the application router
fn build_router(state: AppState) -> Router {
    let api_router = api::create_router().layer(middleware::from_fn(
        api::middleware::logging_middleware,
    ));

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting token_ledger server");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    // Wire the engine: explicit constructor injection, no container
    let store = LedgerStore::new(pool.clone());
    let balances = BalanceService::new(store.clone());
    let (event_notifier, event_receiver) = EventNotifier::channel(config.event_channel_capacity);
    let engine = TransactionEngine::new(store, balances, event_notifier)
        .with_max_retries(config.process_max_retries);

    // Event subscriber: stands in for external webhook/analytics consumers
    let subscriber_handle = tokio::spawn(notifier::run_log_subscriber(event_receiver));

    // Job worker: consumes process/verify jobs off the queue
    let (jobs, job_receiver) = JobQueue::channel(config.job_queue_capacity);
    let worker_handle = tokio::spawn(worker::run_worker(
        engine.clone(),
        jobs.clone(),
        job_receiver,
    ));

    let state = AppState {
        engine,
        analytics: AnalyticsService::new(pool.clone()),
        jobs,
    };

    tracing::info!("Listening on http://{}", addr);

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    worker_handle.abort();
    subscriber_handle.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

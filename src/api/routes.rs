//! API Routes
//!
//! HTTP endpoint definitions. This layer is thin: request shapes are
//! parsed here, everything else is delegated to the engine.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::{AnalyticsService, TokenAggregate};
use crate::domain::{LedgerEntry, Transaction};
use crate::engine::{CreateTransactionCommand, TransactionEngine};
use crate::error::AppError;
use crate::store::TransactionFilter;
use crate::worker::{Job, JobQueue};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub hash: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    #[serde(default)]
    pub from_address: Option<String>,
    #[serde(default)]
    pub to_address: Option<String>,
    pub amount: String,
    pub token_address: String,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetailResponse {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default, rename = "type")]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub token_address: String,
    pub aggregates: Vec<TokenAggregate>,
}

// =========================================================================
// API Router
// =========================================================================

/// Shared application state, explicit constructor injection all the way
#[derive(Clone)]
pub struct AppState {
    pub engine: TransactionEngine,
    pub analytics: AnalyticsService,
    pub jobs: JobQueue,
}

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction).get(list_transactions))
        .route("/transactions/analytics/:token_address", get(token_analytics))
        .route("/transactions/:id", get(get_transaction))
        .route("/transactions/:id/process", post(process_transaction))
        .route("/transactions/:id/verify", post(verify_transaction))
}

// =========================================================================
// Handlers
// =========================================================================

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let tx_type = request
        .tx_type
        .parse()
        .map_err(AppError::InvalidRequest)?;

    let command = CreateTransactionCommand {
        hash: request.hash,
        tx_type,
        from_address: request.from_address,
        to_address: request.to_address,
        amount: request.amount,
        token_address: request.token_address,
        fee: request.fee,
        metadata: request.metadata,
    };

    let transaction = state.engine.create(command).await?;

    // Queue processing; the endpoint below also allows a synchronous kick.
    if let Err(e) = state.jobs.enqueue(Job::process(transaction.id)).await {
        tracing::warn!(
            transaction_id = %transaction.id,
            error = %e,
            "Failed to enqueue processing job"
        );
    }

    Ok((StatusCode::CREATED, Json(transaction)))
}

async fn process_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let transaction = state.engine.process(id).await?;
    Ok(Json(transaction))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionDetailResponse>, AppError> {
    let transaction = state
        .engine
        .store()
        .get_transaction(id)
        .await?
        .ok_or(AppError::NotFound(id))?;

    let entries = state.engine.store().entries_for_transaction(id).await?;

    Ok(Json(TransactionDetailResponse {
        transaction,
        entries,
    }))
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, AppError> {
    let tx_type = query
        .tx_type
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::InvalidRequest)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(AppError::InvalidRequest)?;

    let filter = TransactionFilter {
        address: query.address,
        token_address: query.token_address,
        tx_type,
        status,
        from_date: query.from_date,
        to_date: query.to_date,
        page: query.page,
        limit: query.limit,
    };

    let transactions = state.engine.store().list(&filter).await?;

    Ok(Json(ListTransactionsResponse {
        transactions,
        page: filter.page.max(1),
        limit: filter.effective_limit(),
    }))
}

async fn verify_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerifyResponse>, AppError> {
    let valid = state.engine.verify(id).await?;
    Ok(Json(VerifyResponse { valid }))
}

async fn token_analytics(
    State(state): State<AppState>,
    Path(token_address): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let aggregates = state
        .analytics
        .token_analytics(&token_address, query.from_date, query.to_date)
        .await?;

    Ok(Json(AnalyticsResponse {
        token_address,
        aggregates,
    }))
}

//! Job worker
//!
//! Consumes typed jobs from a queue with at-least-once semantics and
//! drives the transaction engine. Handlers must tolerate redelivery:
//! reprocessing a finished transaction is a harmless `InvalidState`,
//! and serialization conflicts are re-enqueued with a bounded attempt
//! count rather than treated as failures.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::engine::TransactionEngine;
use crate::error::AppError;

/// Bound on re-enqueues of a conflicted processing job
const MAX_JOB_ATTEMPTS: u32 = 5;

/// Asynchronous work item delivered to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum Job {
    ProcessTransaction {
        transaction_id: Uuid,
        #[serde(default)]
        attempt: u32,
    },
    VerifyTransaction {
        transaction_id: Uuid,
    },
}

impl Job {
    pub fn process(transaction_id: Uuid) -> Self {
        Job::ProcessTransaction {
            transaction_id,
            attempt: 0,
        }
    }

    pub fn verify(transaction_id: Uuid) -> Self {
        Job::VerifyTransaction { transaction_id }
    }
}

/// Producer handle onto the job channel
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create a bounded job channel, returning the queue handle and the
    /// receiving end for `run_worker`.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Enqueue a job, waiting for capacity
    pub async fn enqueue(&self, job: Job) -> Result<(), AppError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::Internal("Job queue is closed".to_string()))
    }

    /// Enqueue without waiting; used for re-deliveries from inside the
    /// worker where blocking on our own queue could deadlock.
    fn requeue(&self, job: Job) {
        if let Err(e) = self.sender.try_send(job) {
            tracing::warn!("Failed to requeue job: {}", e);
        }
    }
}

/// Run the worker loop until the queue closes
pub async fn run_worker(engine: TransactionEngine, queue: JobQueue, mut receiver: mpsc::Receiver<Job>) {
    tracing::info!("Job worker started");

    while let Some(job) = receiver.recv().await {
        handle_job(&engine, &queue, job).await;
    }

    tracing::info!("Job worker stopped: queue closed");
}

async fn handle_job(engine: &TransactionEngine, queue: &JobQueue, job: Job) {
    match job {
        Job::ProcessTransaction {
            transaction_id,
            attempt,
        } => match engine.process(transaction_id).await {
            Ok(tx) => {
                tracing::info!(
                    %transaction_id,
                    status = tx.status.as_str(),
                    "Processed transaction"
                );
            }
            // Redelivery of an already-processed job: a safe no-op
            Err(AppError::InvalidState { status, .. }) => {
                tracing::debug!(
                    %transaction_id,
                    status = %status,
                    "Skipping redelivered job, transaction already handled"
                );
            }
            Err(AppError::StorageConflict) if attempt + 1 < MAX_JOB_ATTEMPTS => {
                tracing::warn!(
                    %transaction_id,
                    attempt = attempt + 1,
                    "Contention on transaction, re-enqueueing"
                );
                queue.requeue(Job::ProcessTransaction {
                    transaction_id,
                    attempt: attempt + 1,
                });
            }
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Processing job failed");
            }
        },

        Job::VerifyTransaction { transaction_id } => match engine.verify(transaction_id).await {
            Ok(true) => {
                tracing::debug!(%transaction_id, "Ledger verified");
            }
            Ok(false) => {
                tracing::error!(%transaction_id, "Ledger verification FAILED");
            }
            Err(e) => {
                tracing::error!(%transaction_id, error = %e, "Verification job failed");
            }
        },
    }
}

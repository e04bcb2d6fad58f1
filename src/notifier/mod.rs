//! Event Notifier
//!
//! Best-effort publication of domain events over a bounded channel.
//! Publishing never blocks the transactional commit and a publish failure
//! is never surfaced to the caller: a successful transaction must not
//! appear failed because a subscriber was slow or gone.

use tokio::sync::mpsc;

use crate::domain::DomainEvent;

/// Publishing half of the event channel
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: mpsc::Sender<DomainEvent>,
}

impl EventNotifier {
    /// Create a bounded event channel, returning the notifier and the
    /// receiving end for a subscriber task (webhook dispatch, analytics).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Publish an event, best-effort. A full or closed channel drops the
    /// event with a warning; delivery is at-most-once from the engine's
    /// perspective.
    pub fn publish(&self, event: DomainEvent) {
        let kind = event.kind();
        let transaction_id = event.transaction().id;

        match self.sender.try_send(event) {
            Ok(()) => {
                tracing::debug!(event = kind, %transaction_id, "Published domain event");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    event = kind,
                    %transaction_id,
                    "Event channel full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(
                    event = kind,
                    %transaction_id,
                    "Event channel closed, dropping event"
                );
            }
        }
    }
}

/// Drain events and log them. Stands in for an external subscriber when
/// none is attached; real webhook/analytics consumers take the receiver
/// and run their own loop.
pub async fn run_log_subscriber(mut receiver: mpsc::Receiver<DomainEvent>) {
    while let Some(event) = receiver.recv().await {
        tracing::info!(
            event = event.kind(),
            transaction_id = %event.transaction().id,
            status = event.transaction().status.as_str(),
            "Domain event"
        );
    }
}

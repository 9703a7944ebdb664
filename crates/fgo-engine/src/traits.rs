use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fgo_model::{OwnershipRecord, StoreError, StoreEvent};

/// Seam over the cluster coordination store so the decision engine can be
/// exercised against in-memory fakes.
#[async_trait]
pub trait OwnershipStore: Send + Sync + 'static {
    /// Whether the underlying client is initialized. "Not ready" is a
    /// retryable waiting state, not a failure.
    fn is_ready(&self) -> bool;

    /// Current record, `None` when no instance has claimed yet.
    async fn read(&self) -> Result<Option<OwnershipRecord>, StoreError>;

    /// Create or replace the record. Conflicting concurrent creates are
    /// resolved inside the store; at most one writer's claim persists.
    async fn write(&self, record: &OwnershipRecord) -> Result<(), StoreError>;

    /// Watch the record. The stream delivers `Applied` for every add/modify
    /// and a final `Closed` when it terminates; reconnecting is the
    /// subscriber's job.
    async fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StoreEvent>, StoreError>;
}

/// Answers "is extension X's container currently running?". Backed by the
/// Docker inventory in production, injected per decision.
#[async_trait]
pub trait RunningProbe: Send + Sync {
    async fn is_running(&self, extension: &str) -> bool;
}

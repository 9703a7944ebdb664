use thiserror::Error;

use crate::record::OwnershipRecord;

/// Failures surfaced by the coordination store.
///
/// Not-found on read is `Ok(None)`, not an error, and create conflicts are
/// resolved internally by falling back to a replace; neither appears here.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Cluster client not initialized yet. Retryable; callers should show a
    /// waiting state rather than an error state.
    #[error("cluster client not initialized")]
    NotReady,

    /// Any other API failure during read/write/watch setup. The raw message
    /// is preserved for the decision outcome.
    #[error("cluster request failed: {0}")]
    Transient(String),
}

/// Event delivered on the store's watch channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// The record was added or modified.
    Applied(OwnershipRecord),
    /// The watch stream terminated; the subscriber decides whether to
    /// reconnect. Carries a human-readable reason.
    Closed(String),
}

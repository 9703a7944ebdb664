use async_trait::async_trait;

use fgo_model::OwnershipStatus;

use crate::error::ApiError;
use crate::types::{IdentityInfo, InitRequest, InitResponse, InitStateResponse, OwnershipOverview};

/// Backend surface consumed by the HTTP layer.
///
/// Abstracting the concrete coordinator keeps the routes testable with a
/// stub and leaves room for callers with extra policy (auth, throttling).
#[async_trait]
pub trait OwnershipHandler: Send + Sync + 'static {
    /// This instance's identity.
    async fn identity(&self) -> IdentityInfo;

    /// Accept the frontend's extension snapshot and kubeconfig, then run the
    /// first ownership check.
    async fn init(&self, req: InitRequest) -> Result<InitResponse, ApiError>;

    /// Current initialization state.
    async fn init_state(&self) -> InitStateResponse;

    /// Full ownership debug view.
    async fn overview(&self) -> OwnershipOverview;

    /// Re-run the ownership decision against the last snapshot.
    async fn recheck(&self) -> Result<OwnershipStatus, ApiError>;

    /// Transfer ownership to the named extension and re-check.
    async fn transfer(&self, new_owner: String) -> Result<OwnershipStatus, ApiError>;
}

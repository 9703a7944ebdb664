use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::error::ApiError;
use crate::handler::OwnershipHandler;
use crate::types::{InitRequest, TransferRequest, TransferResponse};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: OwnershipHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build the axum router.
    ///
    /// Routes:
    /// - GET  /health                  - liveness
    /// - GET  /identity                - own identity
    /// - POST /api/init                - initialize with extension snapshot
    /// - GET  /api/init                - initialization state
    /// - GET  /api/ownership           - full ownership debug view
    /// - POST /api/ownership/check     - re-run the ownership decision
    /// - POST /api/ownership/transfer  - transfer ownership
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/identity", get(identity::<H>))
            .route("/api/init", post(init::<H>).get(init_state::<H>))
            .route("/api/ownership", get(overview::<H>))
            .route("/api/ownership/check", post(recheck::<H>))
            .route("/api/ownership/transfer", post(transfer::<H>))
            .with_state(self.handler)
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn identity<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: OwnershipHandler,
{
    Json(handler.identity().await)
}

async fn init<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<InitRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: OwnershipHandler,
{
    Ok(Json(handler.init(req).await?))
}

async fn init_state<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: OwnershipHandler,
{
    Json(handler.init_state().await)
}

async fn overview<H>(State(handler): State<Arc<H>>) -> impl IntoResponse
where
    H: OwnershipHandler,
{
    Json(handler.overview().await)
}

async fn recheck<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: OwnershipHandler,
{
    let ownership = handler.recheck().await?;
    Ok(Json(json!({ "ownership": ownership })))
}

async fn transfer<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: OwnershipHandler,
{
    if req.new_owner.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "newOwner is required and must be a non-empty string".to_string(),
        ));
    }

    let ownership = handler.transfer(req.new_owner.clone()).await?;
    Ok(Json(TransferResponse {
        success: true,
        new_owner: req.new_owner,
        ownership,
    }))
}

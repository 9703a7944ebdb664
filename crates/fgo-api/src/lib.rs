mod error;
pub use error::ApiError;

mod types;
pub use types::{
    DockerDebug, IdentityInfo, InitRequest, InitResponse, InitStateResponse, LogsDebug,
    OwnershipOverview, TransferRequest, TransferResponse,
};

mod handler;
pub use handler::OwnershipHandler;

mod adapter;
pub use adapter::{Coordinator, CoordinatorConfig};

mod http;
pub use http::HttpApi;

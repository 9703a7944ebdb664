use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("failed to connect to docker socket: {0}")]
    Connect(String),

    #[error("docker api call failed: {0}")]
    Api(String),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(e: bollard::errors::Error) -> Self {
        DockerError::Api(e.to_string())
    }
}

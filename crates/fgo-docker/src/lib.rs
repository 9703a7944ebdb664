mod client;
pub use client::{DockerClient, InventoryDebug};

mod error;
pub use error::DockerError;

mod matching;
pub use matching::{container_matches, find_own_container, image_basename};

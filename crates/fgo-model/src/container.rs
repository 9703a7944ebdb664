use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A running container as seen through the Docker socket.
///
/// `id` is the 12-character short form, which inside a container equals the
/// local hostname. Used for identity resolution and running checks only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

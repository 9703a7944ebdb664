use serde::{Deserialize, Serialize};

use fgo_model::{ContainerInfo, InstalledExtension, OwnershipStatus};

/// Who this backend instance believes it is.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityInfo {
    pub container_id: String,
    pub extension_name: String,
    pub extension_type: String,
    pub version: String,
    pub started_at: String,
}

/// Initialization payload from the frontend: the installed-extensions
/// snapshot, optionally the kubeconfig, and optionally the frontend's view
/// of our own image (used as the resolver fallback, never trusted directly).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub installed_extensions: Vec<InstalledExtension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_extension_image: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub initialized: bool,
    pub ownership: OwnershipStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitStateResponse {
    pub initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_init_time: Option<String>,
    pub installed_extensions: Vec<InstalledExtension>,
    pub kubernetes_ready: bool,
    pub docker_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<OwnershipStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub new_owner: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    pub new_owner: String,
    pub ownership: OwnershipStatus,
}

/// Docker inventory slice of the debug view.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerDebug {
    pub available: bool,
    pub fleet_containers: Vec<ContainerInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_container: Option<ContainerInfo>,
}

/// Per-service audit logs for the debug view.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsDebug {
    pub ownership: Vec<String>,
    pub docker: Vec<String>,
    pub cluster: Vec<String>,
}

/// Full ownership status for the operator panel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership: Option<OwnershipStatus>,
    pub own_identity: IdentityInfo,
    pub kubernetes_ready: bool,
    pub docker: DockerDebug,
    pub installed_extensions: Vec<InstalledExtension>,
    pub logs: LogsDebug,
}

use bollard::Docker;
use bollard::container::ListContainersOptions;
use tracing::{debug, warn};

use fgo_model::{AuditLog, ContainerInfo};

use crate::error::DockerError;
use crate::matching::{container_matches, find_own_container};

const DEFAULT_SOCKET: &str = "/var/run/docker.sock";
const API_TIMEOUT_SECS: u64 = 30;

const FLEET_TYPE_LABEL: &str = "io.rancher-desktop.fleet.type";
const FLEET_NAME_LABEL: &str = "io.rancher-desktop.fleet.name";

/// Container inventory snapshot for the debug endpoint.
#[derive(Clone, Debug, Default)]
pub struct InventoryDebug {
    pub available: bool,
    pub containers: Vec<ContainerInfo>,
    pub own_container: Option<ContainerInfo>,
}

/// Docker socket client: container inventory, running checks and identity
/// resolution. All calls degrade gracefully when the socket is unavailable;
/// the audit log records which path was taken.
#[derive(Clone)]
pub struct DockerClient {
    docker: Docker,
    audit: AuditLog,
}

impl DockerClient {
    pub fn connect(socket_path: Option<&str>) -> Result<Self, DockerError> {
        let path = socket_path.unwrap_or(DEFAULT_SOCKET);
        let docker =
            Docker::connect_with_socket(path, API_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .map_err(|e| DockerError::Connect(e.to_string()))?;
        Ok(Self {
            docker,
            audit: AuditLog::new(),
        })
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    /// Running containers only. A socket failure yields an empty list so the
    /// callers' fallback paths stay reachable.
    pub async fn list_containers(&self) -> Vec<ContainerInfo> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        match self.docker.list_containers(Some(options)).await {
            Ok(containers) => containers
                .into_iter()
                .map(|c| ContainerInfo {
                    id: c.id.unwrap_or_default().chars().take(12).collect(),
                    name: c
                        .names
                        .unwrap_or_default()
                        .first()
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    image: c.image.unwrap_or_default(),
                    state: c.state.unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                })
                .collect(),
            Err(e) => {
                self.audit.push(format!("error listing containers: {e}"));
                warn!("error listing containers: {e}");
                Vec::new()
            }
        }
    }

    /// Containers that belong to a Fleet extension (by label or image name).
    pub async fn list_fleet_containers(&self) -> Vec<ContainerInfo> {
        let containers = self.list_containers().await;
        let fleet: Vec<ContainerInfo> = containers
            .into_iter()
            .filter(|c| {
                c.labels.contains_key(FLEET_TYPE_LABEL)
                    || c.labels.contains_key(FLEET_NAME_LABEL)
                    || c.image.contains("fleet-gitops-extension")
            })
            .collect();
        self.audit
            .push(format!("found {} fleet extension containers", fleet.len()));
        fleet
    }

    /// Is any running container backing the named extension? Exact matching
    /// per the three-tier rule in [`crate::matching`].
    pub async fn is_extension_running(&self, extension: &str) -> bool {
        let containers = self.list_containers().await;
        let found = containers.iter().any(|c| container_matches(c, extension));
        self.audit
            .push(format!("extension {extension} running: {found}"));
        debug!(extension, running = found, "running check");
        found
    }

    /// Resolve this instance's extension identity from the container runtime
    /// itself rather than trusting a caller-supplied value: look up our own
    /// container by hostname (= short container ID) and adopt its image
    /// reference. Falls back to `default_name` when the socket is down or
    /// the container is not in the inventory.
    pub async fn resolve_own_identity(&self, hostname: &str, default_name: &str) -> String {
        let containers = self.list_containers().await;
        match find_own_container(&containers, hostname) {
            Some(own) => {
                self.audit.push(format!(
                    "resolved own identity from container {}: {}",
                    own.id, own.image
                ));
                own.image.clone()
            }
            None => {
                self.audit.push(format!(
                    "own container {hostname} not found in inventory, using default identity {default_name}"
                ));
                warn!(hostname, default_name, "own container not found, using default identity");
                default_name.to_string()
            }
        }
    }

    /// Full inventory snapshot for the debug endpoint.
    pub async fn inventory_debug(&self, hostname: &str) -> InventoryDebug {
        if !self.is_available().await {
            return InventoryDebug::default();
        }
        let containers = self.list_fleet_containers().await;
        let own_container = find_own_container(&containers, hostname).cloned();
        InventoryDebug {
            available: true,
            containers,
            own_container,
        }
    }
}

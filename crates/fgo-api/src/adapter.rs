use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use fgo_cluster::ClusterStore;
use fgo_docker::DockerClient;
use fgo_engine::{
    EngineConfig, Identity, OwnershipEngine, OwnershipStore, RunningProbe,
};
use fgo_model::{
    InstalledExtension, OwnershipRecord, OwnershipState, OwnershipStatus, StoreError, StoreEvent,
};

use crate::error::ApiError;
use crate::handler::OwnershipHandler;
use crate::types::{
    DockerDebug, IdentityInfo, InitRequest, InitResponse, InitStateResponse, LogsDebug,
    OwnershipOverview,
};

/// Static facts about this backend build.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub extension_type: String,
    pub version: String,
    pub engine: EngineConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            extension_type: "base".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine: EngineConfig::default(),
        }
    }
}

/// Bridges [`ClusterStore`] into the engine's store seam.
struct StoreAdapter {
    cluster: Arc<ClusterStore>,
}

#[async_trait]
impl OwnershipStore for StoreAdapter {
    fn is_ready(&self) -> bool {
        self.cluster.is_ready()
    }

    async fn read(&self) -> Result<Option<OwnershipRecord>, StoreError> {
        self.cluster.read().await
    }

    async fn write(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        self.cluster.write(record).await
    }

    async fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StoreEvent>, StoreError> {
        self.cluster.subscribe(cancel).await
    }
}

/// Answers the engine's "is the owner running?" question from the Docker
/// inventory.
struct DockerProbe {
    docker: DockerClient,
}

#[async_trait]
impl RunningProbe for DockerProbe {
    async fn is_running(&self, extension: &str) -> bool {
        self.docker.is_extension_running(extension).await
    }
}

#[derive(Default)]
struct InitState {
    initialized: bool,
    last_init_time: Option<String>,
    installed: Vec<InstalledExtension>,
    last_status: Option<OwnershipStatus>,
}

/// Production [`OwnershipHandler`]: wires the cluster store, the Docker
/// inventory and the decision engine together and keeps the last
/// initialization snapshot for rechecks and the debug view.
pub struct Coordinator {
    cluster: Arc<ClusterStore>,
    docker: DockerClient,
    engine: Arc<OwnershipEngine>,
    probe: DockerProbe,
    state: Mutex<InitState>,
    extension_type: String,
    version: String,
    started_at: String,
}

impl Coordinator {
    pub fn new(
        cluster: Arc<ClusterStore>,
        docker: DockerClient,
        identity: Arc<Identity>,
        config: CoordinatorConfig,
    ) -> Self {
        let store = Arc::new(StoreAdapter {
            cluster: cluster.clone(),
        });
        let engine = Arc::new(OwnershipEngine::with_config(store, identity, config.engine));
        let probe = DockerProbe {
            docker: docker.clone(),
        };

        Self {
            cluster,
            docker,
            engine,
            probe,
            state: Mutex::new(InitState::default()),
            extension_type: config.extension_type,
            version: config.version,
            started_at: now_rfc3339(),
        }
    }

    /// The shared decision engine, for wiring up the handoff listener.
    pub fn engine(&self) -> &Arc<OwnershipEngine> {
        &self.engine
    }

    /// Placeholder status reported before the first `/api/init`.
    fn pending_status(&self) -> OwnershipStatus {
        let identity = self.engine.identity();
        OwnershipStatus {
            is_owner: false,
            current_owner: None,
            own_container_id: identity.container_id().to_string(),
            own_extension_name: identity.extension_name(),
            status: OwnershipState::Pending,
            message: "Waiting for initialization from frontend".to_string(),
            debug_log: vec![],
        }
    }

    fn identity_info(&self) -> IdentityInfo {
        let identity = self.engine.identity();
        IdentityInfo {
            container_id: identity.container_id().to_string(),
            extension_name: identity.extension_name(),
            extension_type: self.extension_type.clone(),
            version: self.version.clone(),
            started_at: self.started_at.clone(),
        }
    }
}

#[async_trait]
impl OwnershipHandler for Coordinator {
    async fn identity(&self) -> IdentityInfo {
        self.identity_info()
    }

    async fn init(&self, req: InitRequest) -> Result<InitResponse, ApiError> {
        let identity = self.engine.identity();

        // The frontend's view of our image is only a fallback; the resolver
        // below cross-checks it against the actual container inventory.
        if let Some(image) = req.own_extension_image.as_deref() {
            let image = image.trim();
            if !image.is_empty() {
                identity.set_extension_name(image);
            }
        }

        if let Some(kubeconfig) = req.kubeconfig.as_deref() {
            if let Err(e) = self.cluster.initialize(kubeconfig).await {
                // A bad kubeconfig is not fatal to init; the ownership check
                // below reports the not-ready state and the frontend retries.
                warn!("kubernetes client initialization failed: {e}");
            }
        }

        let resolved = self
            .docker
            .resolve_own_identity(identity.container_id(), &identity.extension_name())
            .await;
        identity.set_extension_name(resolved);

        let ownership = self
            .engine
            .check_ownership(&req.installed_extensions, &self.probe)
            .await;

        let mut state = self.state.lock().await;
        state.initialized = true;
        state.last_init_time = Some(now_rfc3339());
        state.installed = req.installed_extensions;
        state.last_status = Some(ownership.clone());

        Ok(InitResponse {
            initialized: true,
            ownership,
        })
    }

    async fn init_state(&self) -> InitStateResponse {
        let state = self.state.lock().await;
        InitStateResponse {
            initialized: state.initialized,
            last_init_time: state.last_init_time.clone(),
            installed_extensions: state.installed.clone(),
            kubernetes_ready: self.cluster.is_ready(),
            docker_available: self.docker.is_available().await,
            ownership: Some(
                state
                    .last_status
                    .clone()
                    .unwrap_or_else(|| self.pending_status()),
            ),
        }
    }

    async fn overview(&self) -> OwnershipOverview {
        let own_identity = self.identity_info();
        let inventory = self
            .docker
            .inventory_debug(self.engine.identity().container_id())
            .await;

        let state = self.state.lock().await;
        OwnershipOverview {
            ownership: Some(
                state
                    .last_status
                    .clone()
                    .unwrap_or_else(|| self.pending_status()),
            ),
            own_identity,
            kubernetes_ready: self.cluster.is_ready(),
            docker: DockerDebug {
                available: inventory.available,
                fleet_containers: inventory.containers,
                own_container: inventory.own_container,
            },
            installed_extensions: state.installed.clone(),
            logs: LogsDebug {
                ownership: self.engine.audit_log().snapshot(),
                docker: self.docker.audit_log().snapshot(),
                cluster: self.cluster.audit_log().snapshot(),
            },
        }
    }

    async fn recheck(&self) -> Result<OwnershipStatus, ApiError> {
        if !self.cluster.is_ready() {
            return Err(StoreError::NotReady.into());
        }

        let installed = self.state.lock().await.installed.clone();
        let ownership = self.engine.check_ownership(&installed, &self.probe).await;
        self.state.lock().await.last_status = Some(ownership.clone());
        Ok(ownership)
    }

    async fn transfer(&self, new_owner: String) -> Result<OwnershipStatus, ApiError> {
        if !self.cluster.is_ready() {
            return Err(StoreError::NotReady.into());
        }

        self.engine.transfer_to(&new_owner).await?;

        // Re-run the decision so the caller sees the post-transfer view
        // (yielded, with the record now naming the new owner).
        self.recheck().await
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgo_model::OwnershipState;

    // bollard checks socket existence eagerly but connects lazily, so a
    // placeholder file builds a client whose calls all fail; that exercises
    // every degraded path at once.
    fn coordinator() -> Coordinator {
        let cluster = Arc::new(ClusterStore::new());
        std::fs::File::create("/tmp/absent-docker.sock")
            .expect("create placeholder socket file");
        let docker = DockerClient::connect(Some("/tmp/absent-docker.sock"))
            .expect("socket clients build lazily");
        let identity = Arc::new(Identity::new("abc123def456", "fleet-gitops", 100));
        Coordinator::new(cluster, docker, identity, CoordinatorConfig::default())
    }

    #[tokio::test]
    async fn init_without_kubeconfig_reports_error_status() {
        let c = coordinator();
        let resp = c
            .init(InitRequest {
                installed_extensions: vec![],
                kubeconfig: None,
                own_extension_image: Some("ghcr.io/acme/fleet-gitops:1.0".to_string()),
            })
            .await
            .unwrap();

        assert!(resp.initialized);
        assert_eq!(resp.ownership.status, OwnershipState::Error);
        assert!(resp.ownership.message.contains("not initialized"));

        // Docker is down, so the resolver falls back to the frontend value.
        assert_eq!(
            c.identity().await.extension_name,
            "ghcr.io/acme/fleet-gitops:1.0"
        );

        let state = c.init_state().await;
        assert!(state.initialized);
        assert!(state.last_init_time.is_some());
        assert!(!state.kubernetes_ready);
    }

    #[tokio::test]
    async fn pre_init_surface_reports_pending() {
        let c = coordinator();

        let state = c.init_state().await;
        let ownership = state.ownership.unwrap();
        assert_eq!(ownership.status, OwnershipState::Pending);
        assert!(!ownership.is_owner);

        let view = c.overview().await;
        assert_eq!(view.ownership.unwrap().status, OwnershipState::Pending);

        // the first init replaces the placeholder
        let _ = c
            .init(InitRequest {
                installed_extensions: vec![],
                kubeconfig: None,
                own_extension_image: None,
            })
            .await;
        let state = c.init_state().await;
        assert_eq!(state.ownership.unwrap().status, OwnershipState::Error);
    }

    #[tokio::test]
    async fn recheck_and_transfer_require_ready_cluster() {
        let c = coordinator();
        assert!(matches!(c.recheck().await, Err(ApiError::NotReady(_))));
        assert!(matches!(
            c.transfer("other:1.0".to_string()).await,
            Err(ApiError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn overview_collects_audit_logs() {
        let c = coordinator();
        let _ = c
            .init(InitRequest {
                installed_extensions: vec![],
                kubeconfig: None,
                own_extension_image: None,
            })
            .await;

        let view = c.overview().await;
        assert!(!view.kubernetes_ready);
        assert!(!view.docker.available);
        assert!(
            view.logs
                .ownership
                .iter()
                .any(|line| line.contains("starting ownership check"))
        );
    }
}

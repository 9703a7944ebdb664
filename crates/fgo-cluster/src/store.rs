use std::sync::RwLock;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use kube::api::{Api, ObjectMeta, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::watcher;
use kube::{Client, Config};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fgo_model::{AuditLog, CONFIGMAP_NAME, NAMESPACE, OwnershipRecord, StoreError, StoreEvent};

use crate::kubeconfig::patch_for_container;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// The coordination store: one ConfigMap in a fixed namespace.
///
/// Constructed uninitialized; the kubeconfig arrives later from the frontend
/// and [`ClusterStore::initialize`] installs the client. Every accessor
/// returns [`StoreError::NotReady`] until then, which callers treat as a
/// retryable waiting state.
pub struct ClusterStore {
    client: RwLock<Option<Client>>,
    audit: AuditLog,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            audit: AuditLog::new(),
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn is_ready(&self) -> bool {
        self.client.read().unwrap().is_some()
    }

    /// Install a client from the frontend-supplied kubeconfig, rewritten for
    /// in-container use. Idempotent; a second call replaces the client.
    pub async fn initialize(&self, kubeconfig_yaml: &str) -> Result<(), StoreError> {
        let patched = patch_for_container(kubeconfig_yaml);
        if patched != kubeconfig_yaml {
            self.audit
                .push("patched kubeconfig: rewrote loopback server to host.docker.internal");
        }

        let kubeconfig = Kubeconfig::from_yaml(&patched)
            .map_err(|e| StoreError::Transient(format!("invalid kubeconfig: {e}")))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| StoreError::Transient(format!("kubeconfig load failed: {e}")))?;
        let client =
            Client::try_from(config).map_err(|e| StoreError::Transient(e.to_string()))?;

        *self.client.write().unwrap() = Some(client);
        self.audit.push("kubernetes client initialized");
        info!("kubernetes client initialized");
        Ok(())
    }

    fn client(&self) -> Result<Client, StoreError> {
        self.client
            .read()
            .unwrap()
            .clone()
            .ok_or(StoreError::NotReady)
    }

    /// Read the ownership record. Absent ConfigMap is `Ok(None)`, not an
    /// error: it means no instance has claimed yet.
    pub async fn read(&self) -> Result<Option<OwnershipRecord>, StoreError> {
        let api = Api::<ConfigMap>::namespaced(self.client()?, NAMESPACE);

        match api.get(CONFIGMAP_NAME).await {
            Ok(cm) => {
                let record = OwnershipRecord::from_data(&cm.data.unwrap_or_default());
                self.audit.push(format!(
                    "read record: owner={}, container={}",
                    record.owner_extension_name, record.owner_container_id
                ));
                Ok(Some(record))
            }
            Err(e) if is_status(&e, 404) => {
                self.audit.push("ownership ConfigMap not found");
                Ok(None)
            }
            Err(e) => {
                self.audit.push(format!("error reading ConfigMap: {e}"));
                Err(StoreError::Transient(e.to_string()))
            }
        }
    }

    /// Create or replace the ownership record. Ensures the namespace exists,
    /// tries a create, and falls back to a full replace on conflict; the
    /// conflict is never surfaced to the caller.
    pub async fn write(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        let client = self.client()?;
        self.ensure_namespace(&client).await?;

        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(CONFIGMAP_NAME.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(record.to_data()),
            ..Default::default()
        };

        let api = Api::<ConfigMap>::namespaced(client, NAMESPACE);
        let pp = PostParams::default();

        match api.create(&pp, &cm).await {
            Ok(_) => {
                self.audit.push(format!(
                    "created ownership record: claimed by {}",
                    record.owner_extension_name
                ));
                Ok(())
            }
            Err(e) if is_status(&e, 409) => {
                api.replace(CONFIGMAP_NAME, &pp, &cm)
                    .await
                    .map_err(|e| StoreError::Transient(e.to_string()))?;
                self.audit.push(format!(
                    "replaced ownership record: claimed by {}",
                    record.owner_extension_name
                ));
                Ok(())
            }
            Err(e) => {
                self.audit.push(format!("error writing ConfigMap: {e}"));
                Err(StoreError::Transient(e.to_string()))
            }
        }
    }

    /// Open a name-filtered watch on the record, bridged to a channel.
    ///
    /// Added/modified events arrive as [`StoreEvent::Applied`]. On the first
    /// watch failure a single [`StoreEvent::Closed`] is sent and the stream
    /// ends; the subscriber owns the reconnect policy. Cancelling the token
    /// or dropping the receiver stops the background task.
    pub async fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StoreEvent>, StoreError> {
        let client = self.client()?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let audit = self.audit.clone();

        tokio::spawn(async move {
            let api = Api::<ConfigMap>::namespaced(client, NAMESPACE);
            let config =
                watcher::Config::default().fields(&format!("metadata.name={CONFIGMAP_NAME}"));
            let mut stream = watcher(api, config).boxed();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("ownership watch cancelled");
                        return;
                    }
                    event = stream.next() => match event {
                        Some(Ok(watcher::Event::Apply(cm)))
                        | Some(Ok(watcher::Event::InitApply(cm))) => {
                            let record = OwnershipRecord::from_data(&cm.data.unwrap_or_default());
                            if tx.send(StoreEvent::Applied(record)).await.is_err() {
                                return;
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            audit.push(format!("ownership watch failed: {e}"));
                            warn!("ownership watch failed: {e}");
                            let _ = tx.send(StoreEvent::Closed(e.to_string())).await;
                            return;
                        }
                        None => {
                            let _ = tx
                                .send(StoreEvent::Closed("watch stream ended".to_string()))
                                .await;
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn ensure_namespace(&self, client: &Client) -> Result<(), StoreError> {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let api = Api::<Namespace>::all(client.clone());
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                self.audit.push(format!("created namespace {NAMESPACE}"));
                Ok(())
            }
            Err(e) if is_status(&e, 409) => Ok(()),
            Err(e) => Err(StoreError::Transient(e.to_string())),
        }
    }
}

impl Default for ClusterStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == code)
}

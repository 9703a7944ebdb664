use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::UnixListener;
use tracing::{info, warn};

use fgo_api::{Coordinator, CoordinatorConfig, HttpApi};
use fgo_cluster::ClusterStore;
use fgo_docker::DockerClient;
use fgo_engine::{EngineConfig, Identity, spawn_handoff_listener};
use fgo_model::DEFAULT_PRIORITY;
use fgo_observe::{LoggerConfig, logger_init};

const DEFAULT_EXTENSION_NAME: &str = "fleet-gitops";
const DEFAULT_SOCKET_PATH: &str = "/run/guest-services/fleet-gitops.sock";

/// Process configuration from the environment.
struct BackendConfig {
    extension_name: String,
    extension_type: String,
    priority: i64,
    socket_path: String,
    docker_socket: Option<String>,
}

impl BackendConfig {
    fn from_env() -> anyhow::Result<Self> {
        let priority = match std::env::var("EXTENSION_PRIORITY") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid EXTENSION_PRIORITY: {raw}"))?,
            Err(_) => DEFAULT_PRIORITY,
        };

        Ok(Self {
            extension_name: env_or("EXTENSION_NAME", DEFAULT_EXTENSION_NAME),
            extension_type: env_or("EXTENSION_TYPE", "base"),
            priority,
            socket_path: env_or("SOCKET_PATH", DEFAULT_SOCKET_PATH),
            docker_socket: std::env::var("DOCKER_SOCKET").ok(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    let logger_cfg = LoggerConfig::from_env()?;
    logger_init(&logger_cfg)?;

    let cfg = BackendConfig::from_env()?;

    // 2) Identity: the in-container hostname is our container's short ID.
    let container_id = hostname::get()
        .context("reading hostname")?
        .to_string_lossy()
        .into_owned();
    let identity = Arc::new(Identity::new(
        container_id.clone(),
        cfg.extension_name.clone(),
        cfg.priority,
    ));
    info!(
        %container_id,
        extension = %cfg.extension_name,
        priority = cfg.priority,
        "identity established"
    );

    // 3) Services
    let cluster = Arc::new(ClusterStore::new());
    let docker = DockerClient::connect(cfg.docker_socket.as_deref())?;
    let coordinator = Arc::new(Coordinator::new(
        cluster,
        docker,
        identity,
        CoordinatorConfig {
            extension_type: cfg.extension_type,
            version: env!("CARGO_PKG_VERSION").to_string(),
            engine: EngineConfig::default(),
        },
    ));

    // 4) Reactive handoff listener
    let (guard, mut notices) = spawn_handoff_listener(coordinator.engine().clone());
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            info!(
                owner = %notice.record.owner_extension_name,
                "ownership handed off to this instance"
            );
        }
    });

    // 5) HTTP API over the extension's unix socket
    let listener = bind_socket(&cfg.socket_path).await?;
    info!(socket = %cfg.socket_path, "listening");

    let router = HttpApi::new(coordinator).router();
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http api")?;

    guard.stop();
    info!("shutdown complete");
    Ok(())
}

/// Bind the unix socket, replacing any stale file from a previous run.
/// The Docker Desktop frontend connects as an unprivileged user, so the
/// socket must be world-writable.
async fn bind_socket(path: &str) -> anyhow::Result<UnixListener> {
    let path = Path::new(path);
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!(socket = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {}", path.display())),
    }

    let listener =
        UnixListener::bind(path).with_context(|| format!("binding {}", path.display()))?;
    let perms = std::fs::Permissions::from_mode(0o666);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("setting permissions on {}", path.display()))?;
    Ok(listener)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to install shutdown signal handler: {e}");
    }
}

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use fgo_model::{
    AuditLog, InstalledExtension, OwnershipRecord, OwnershipState, OwnershipStatus, StoreError,
};

use crate::config::EngineConfig;
use crate::identity::Identity;
use crate::traits::{OwnershipStore, RunningProbe};

/// The ownership decision engine.
///
/// One decision per [`OwnershipEngine::check_ownership`] call, evaluated
/// against the shared record, this instance's identity, the caller's
/// installed-extensions snapshot and an injected running probe. The record
/// write is create-or-replace; correctness under concurrent instances relies
/// on the store's create-conflict semantics plus claims by the same identity
/// being idempotent.
pub struct OwnershipEngine {
    store: Arc<dyn OwnershipStore>,
    identity: Arc<Identity>,
    config: EngineConfig,
    audit: AuditLog,
}

impl OwnershipEngine {
    pub fn new(store: Arc<dyn OwnershipStore>, identity: Arc<Identity>) -> Self {
        Self::with_config(store, identity, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn OwnershipStore>,
        identity: Arc<Identity>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            identity,
            config,
            audit: AuditLog::new(),
        }
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn OwnershipStore> {
        &self.store
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Write a fresh claim naming this instance as owner.
    pub async fn claim(&self) -> Result<(), StoreError> {
        let record = OwnershipRecord::claim(
            self.identity.extension_name(),
            self.identity.container_id(),
            self.identity.priority(),
        );
        self.store.write(&record).await
    }

    /// Write a transfer record naming `new_owner` with the pending-reclaim
    /// sentinel (empty container ID). The new owner notices via its watch
    /// and reclaims.
    pub async fn transfer_to(&self, new_owner: &str) -> Result<(), StoreError> {
        self.audit
            .push(format!("transferring ownership to {new_owner}"));
        info!(new_owner, "transferring ownership");
        let record = OwnershipRecord::transfer(new_owner, self.identity.priority());
        self.store.write(&record).await
    }

    /// Run the ownership decision. First matching branch wins:
    ///
    /// 1. no record -> claim;
    /// 2. record names us -> reclaim with fresh container ID;
    /// 3. recorded owner not in the installed snapshot -> take over;
    /// 4. owner installed and running -> yield;
    /// 5. owner installed but not running -> bounded wait, then yield if it
    ///    appeared or take over if it never did.
    ///
    /// Errors never propagate; they land in an `error` outcome with the raw
    /// message so the operator panel can show what went wrong.
    pub async fn check_ownership(
        &self,
        installed: &[InstalledExtension],
        probe: &dyn RunningProbe,
    ) -> OwnershipStatus {
        let own_name = self.identity.extension_name();
        self.audit.push("=== starting ownership check ===");
        self.audit.push(format!(
            "own identity: {own_name} (container: {})",
            self.identity.container_id()
        ));
        self.audit.push(format!(
            "installed extensions: {}",
            installed
                .iter()
                .map(InstalledExtension::full_name)
                .collect::<Vec<_>>()
                .join(", ")
        ));

        if !self.store.is_ready() {
            self.audit.push("cluster client not initialized");
            return self.status(
                false,
                None,
                OwnershipState::Error,
                "Kubernetes client not initialized. Waiting for kubeconfig from frontend.",
            );
        }

        match self.decide(&own_name, installed, probe).await {
            Ok(status) => status,
            Err(e) => {
                self.audit.push(format!("error during ownership check: {e}"));
                error!("error during ownership check: {e}");
                self.status(
                    false,
                    None,
                    OwnershipState::Error,
                    &format!("Error checking ownership: {e}"),
                )
            }
        }
    }

    async fn decide(
        &self,
        own_name: &str,
        installed: &[InstalledExtension],
        probe: &dyn RunningProbe,
    ) -> Result<OwnershipStatus, StoreError> {
        let record = self.store.read().await?;

        // Case 1: nobody has claimed yet.
        let Some(record) = record else {
            self.audit.push("decision: no existing owner, claiming");
            info!("no existing owner, claiming ownership");
            self.claim().await?;
            return Ok(self.status(
                true,
                None,
                OwnershipState::Claimed,
                "Claimed ownership (first extension to start)",
            ));
        };

        let owner = record.owner_extension_name.clone();

        // Case 2: the record names us; refresh it with our container ID.
        // Covers both a restart (stale container ID) and a transfer directed
        // at us (empty sentinel).
        if owner == own_name {
            self.audit
                .push(format!("decision: we are the owner ({owner}), reclaiming"));
            info!(%owner, "reclaiming ownership");
            self.claim().await?;
            return Ok(self.status(
                true,
                Some(&owner),
                OwnershipState::Reclaimed,
                &format!(
                    "Reclaimed ownership after restart (was container {})",
                    record.owner_container_id
                ),
            ));
        }

        // Case 3: the recorded owner is gone from the installed snapshot.
        // The comparison is the exact name:tag form; a bare recorded name is
        // matched against the bare extension name.
        let owner_installed = installed
            .iter()
            .any(|e| e.full_name() == owner || e.name == owner);
        self.audit
            .push(format!("current owner: {owner}, installed: {owner_installed}"));

        if !owner_installed {
            self.audit
                .push("decision: owner not installed, taking over immediately");
            info!(%owner, "owner not installed, taking over");
            self.claim().await?;
            return Ok(self.status(
                true,
                Some(&owner),
                OwnershipState::TakenOver,
                &format!("Took over from uninstalled extension: {owner}"),
            ));
        }

        // Case 4: owner installed and its container is up.
        if probe.is_running(&owner).await {
            self.audit.push("decision: owner is running, yielding");
            debug!(%owner, "owner running, yielding");
            return Ok(self.status(
                false,
                Some(&owner),
                OwnershipState::Yielded,
                &format!("Another extension owns Fleet: {owner}"),
            ));
        }

        // Case 5: owner installed but not running; grant it a bounded grace
        // period to come up before taking over.
        self.audit.push(format!(
            "owner not running yet, waiting up to {}ms",
            self.config.wait_timeout.as_millis()
        ));
        let started = Instant::now();

        while started.elapsed() < self.config.wait_timeout {
            tokio::time::sleep(self.config.poll_interval).await;
            let waited = started.elapsed().as_millis();

            if probe.is_running(&owner).await {
                self.audit
                    .push(format!("decision: owner started after {waited}ms, yielding"));
                info!(%owner, waited_ms = waited as u64, "owner started, yielding");
                return Ok(self.status(
                    false,
                    Some(&owner),
                    OwnershipState::Yielded,
                    &format!("Owner {owner} started (waited {waited}ms)"),
                ));
            }
            self.audit.push(format!("still waiting for owner ({waited}ms elapsed)"));
        }

        let timeout_ms = self.config.wait_timeout.as_millis();
        self.audit.push(format!(
            "decision: owner did not start within {timeout_ms}ms, taking over"
        ));
        warn!(%owner, "owner never started, taking over");
        self.claim().await?;
        Ok(self.status(
            true,
            Some(&owner),
            OwnershipState::TakenOver,
            &format!("Took over from non-responsive {owner} (waited {timeout_ms}ms)"),
        ))
    }

    fn status(
        &self,
        is_owner: bool,
        current_owner: Option<&str>,
        state: OwnershipState,
        message: &str,
    ) -> OwnershipStatus {
        OwnershipStatus {
            is_owner,
            current_owner: current_owner.map(str::to_string),
            own_container_id: self.identity.container_id().to_string(),
            own_extension_name: self.identity.extension_name(),
            status: state,
            message: message.to_string(),
            debug_log: self.audit.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use fgo_model::OwnershipState;

    use super::*;
    use crate::testutil::MemoryStore;

    struct FixedProbe(bool);

    #[async_trait]
    impl RunningProbe for FixedProbe {
        async fn is_running(&self, _extension: &str) -> bool {
            self.0
        }
    }

    /// Reports not-running for the first `n` polls, running afterwards.
    struct LateProbe {
        polls_until_up: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RunningProbe for LateProbe {
        async fn is_running(&self, _extension: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) >= self.polls_until_up
        }
    }

    fn engine_with(store: Arc<MemoryStore>, name: &str) -> OwnershipEngine {
        let identity = Arc::new(Identity::new("abc123def456", name, 100));
        OwnershipEngine::new(store, identity)
    }

    fn installed(names: &[(&str, Option<&str>)]) -> Vec<InstalledExtension> {
        names
            .iter()
            .map(|(n, t)| InstalledExtension::new(*n, *t))
            .collect()
    }

    #[tokio::test]
    async fn first_claim_when_store_is_empty() {
        let store = Arc::new(MemoryStore::ready());
        let engine = engine_with(store.clone(), "x");

        let status = engine
            .check_ownership(&installed(&[("x", None)]), &FixedProbe(false))
            .await;

        assert!(status.is_owner);
        assert_eq!(status.status, OwnershipState::Claimed);
        let record = store.read().await.unwrap().unwrap();
        assert_eq!(record.owner_extension_name, "x");
        assert_eq!(record.owner_container_id, "abc123def456");
    }

    #[tokio::test]
    async fn reclaim_is_idempotent() {
        let store = Arc::new(MemoryStore::ready());
        store.set_record(OwnershipRecord::claim("x", "oldcontainer1", 100));
        let engine = engine_with(store.clone(), "x");

        for _ in 0..3 {
            let status = engine
                .check_ownership(&installed(&[("x", None)]), &FixedProbe(false))
                .await;
            assert!(status.is_owner);
            assert_eq!(status.status, OwnershipState::Reclaimed);
        }

        let record = store.read().await.unwrap().unwrap();
        assert_eq!(record.owner_container_id, "abc123def456");
    }

    #[tokio::test]
    async fn tag_mismatch_counts_as_not_installed() {
        let store = Arc::new(MemoryStore::ready());
        store.set_record(OwnershipRecord::claim("x:1.0", "othercontainer", 100));
        let engine = engine_with(store.clone(), "y:1.0");

        let status = engine
            .check_ownership(&installed(&[("x", Some("2.0")), ("y", Some("1.0"))]), &FixedProbe(true))
            .await;

        assert!(status.is_owner);
        assert_eq!(status.status, OwnershipState::TakenOver);
        assert_eq!(status.current_owner.as_deref(), Some("x:1.0"));
    }

    #[tokio::test]
    async fn yields_to_running_owner_without_writing() {
        let store = Arc::new(MemoryStore::ready());
        let record = OwnershipRecord::claim("a", "containera1", 100);
        store.set_record(record.clone());
        let engine = engine_with(store.clone(), "b");

        let status = engine
            .check_ownership(&installed(&[("a", None), ("b", None)]), &FixedProbe(true))
            .await;

        assert!(!status.is_owner);
        assert_eq!(status.status, OwnershipState::Yielded);
        assert_eq!(status.current_owner.as_deref(), Some("a"));
        // store untouched
        assert_eq!(store.read().await.unwrap().unwrap(), record);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn takes_over_after_bounded_wait() {
        let store = Arc::new(MemoryStore::ready());
        store.set_record(OwnershipRecord::claim("a", "containera1", 100));
        let engine = engine_with(store.clone(), "b");

        let started = Instant::now();
        let status = engine
            .check_ownership(&installed(&[("a", None), ("b", None)]), &FixedProbe(false))
            .await;

        assert!(status.is_owner);
        assert_eq!(status.status, OwnershipState::TakenOver);
        assert!(status.message.contains("non-responsive a"));
        // blocked for the configured timeout, within one poll interval
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed <= Duration::from_secs(32));

        let record = store.read().await.unwrap().unwrap();
        assert_eq!(record.owner_extension_name, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn yields_when_owner_starts_during_wait() {
        let store = Arc::new(MemoryStore::ready());
        store.set_record(OwnershipRecord::claim("a", "containera1", 100));
        let engine = engine_with(store.clone(), "b");

        let probe = LateProbe {
            polls_until_up: 3,
            calls: AtomicUsize::new(0),
        };
        let status = engine
            .check_ownership(&installed(&[("a", None), ("b", None)]), &probe)
            .await;

        assert!(!status.is_owner);
        assert_eq!(status.status, OwnershipState::Yielded);
        assert!(status.message.contains("started (waited"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn not_ready_store_reports_error_outcome() {
        let store = Arc::new(MemoryStore::not_ready());
        let engine = engine_with(store, "x");

        let status = engine
            .check_ownership(&installed(&[("x", None)]), &FixedProbe(false))
            .await;

        assert!(!status.is_owner);
        assert_eq!(status.status, OwnershipState::Error);
        assert!(status.message.contains("not initialized"));
    }

    #[tokio::test]
    async fn read_failure_lands_in_error_outcome() {
        let store = Arc::new(MemoryStore::ready());
        store.fail_reads("connection refused");
        let engine = engine_with(store, "x");

        let status = engine
            .check_ownership(&installed(&[("x", None)]), &FixedProbe(false))
            .await;

        assert_eq!(status.status, OwnershipState::Error);
        assert!(status.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn transfer_writes_pending_reclaim_sentinel() {
        let store = Arc::new(MemoryStore::ready());
        let engine = engine_with(store.clone(), "a");

        engine.transfer_to("b").await.unwrap();

        let record = store.read().await.unwrap().unwrap();
        assert_eq!(record.owner_extension_name, "b");
        assert!(record.is_pending_reclaim());
    }
}

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fgo_model::{OwnershipRecord, StoreError, StoreEvent};

use crate::engine::OwnershipEngine;

const NOTICE_CHANNEL_CAPACITY: usize = 4;

/// Sent on the handoff channel once per genuine transfer reclaimed by this
/// instance.
#[derive(Clone, Debug)]
pub struct HandoffNotice {
    /// The transfer record that triggered the reclaim.
    pub record: OwnershipRecord,
}

/// Stop handle for the handoff listener. `stop` is idempotent; after it
/// returns no reconnect timer will fire again.
pub struct HandoffGuard {
    cancel: CancellationToken,
}

impl HandoffGuard {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Start the reactive handoff listener.
///
/// Watches the coordination store so an explicit "transfer ownership to us"
/// record (our name, empty container ID) is noticed without polling: the
/// listener reclaims by writing our container ID and emits one
/// [`HandoffNotice`]. Events naming other instances, events already carrying
/// our container ID, and duplicate deliveries inside the post-reclaim
/// cooldown are ignored. Watch failures reconnect after a fixed backoff
/// until the guard is stopped.
///
/// Events are handled sequentially on one task, so a reclaim is never issued
/// while another is in flight.
pub fn spawn_handoff_listener(
    engine: Arc<OwnershipEngine>,
) -> (HandoffGuard, mpsc::Receiver<HandoffNotice>) {
    let cancel = CancellationToken::new();
    let (notices, rx) = mpsc::channel(NOTICE_CHANNEL_CAPACITY);

    let token = cancel.clone();
    tokio::spawn(async move {
        run(engine, token, notices).await;
    });

    (HandoffGuard { cancel }, rx)
}

async fn run(
    engine: Arc<OwnershipEngine>,
    cancel: CancellationToken,
    notices: mpsc::Sender<HandoffNotice>,
) {
    let backoff = engine.config().reconnect_backoff;
    let mut cooldown_until: Option<Instant> = None;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match engine.store().subscribe(cancel.child_token()).await {
            Ok(mut events) => {
                engine.audit_log().push("handoff watch established");
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        event = events.recv() => match event {
                            Some(StoreEvent::Applied(record)) => {
                                handle_record(&engine, &record, &mut cooldown_until, &notices)
                                    .await;
                            }
                            Some(StoreEvent::Closed(reason)) => {
                                engine.audit_log().push(format!(
                                    "handoff watch closed: {reason}, reconnecting in {}s",
                                    backoff.as_secs()
                                ));
                                warn!(%reason, "handoff watch closed, will reconnect");
                                break;
                            }
                            None => {
                                debug!("handoff watch channel dropped, will reconnect");
                                break;
                            }
                        }
                    }
                }
            }
            Err(StoreError::NotReady) => {
                debug!("cluster client not ready, handoff watch deferred");
            }
            Err(e) => {
                engine
                    .audit_log()
                    .push(format!("handoff watch setup failed: {e}"));
                warn!("handoff watch setup failed: {e}");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

async fn handle_record(
    engine: &OwnershipEngine,
    record: &OwnershipRecord,
    cooldown_until: &mut Option<Instant>,
    notices: &mpsc::Sender<HandoffNotice>,
) {
    let identity = engine.identity();

    if record.owner_extension_name != identity.extension_name() {
        return;
    }
    if record.owner_container_id == identity.container_id() {
        // our own claim echoed back
        return;
    }
    if let Some(until) = *cooldown_until
        && Instant::now() < until
    {
        engine
            .audit_log()
            .push("ignoring duplicate transfer delivery inside cooldown");
        return;
    }

    engine
        .audit_log()
        .push("ownership transferred to us, reclaiming");
    info!("ownership transferred to us, reclaiming");

    match engine.claim().await {
        Ok(()) => {
            *cooldown_until = Some(Instant::now() + engine.config().reclaim_cooldown);
            if notices
                .try_send(HandoffNotice {
                    record: record.clone(),
                })
                .is_err()
            {
                engine
                    .audit_log()
                    .push("handoff notice dropped: no consumer");
            }
        }
        Err(e) => {
            engine
                .audit_log()
                .push(format!("reactive reclaim failed: {e}"));
            warn!("reactive reclaim failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::identity::Identity;
    use crate::testutil::MemoryStore;
    use crate::traits::OwnershipStore;

    fn engine_on(store: Arc<MemoryStore>) -> Arc<OwnershipEngine> {
        let identity = Arc::new(Identity::new("abc123def456", "fleet-gitops:1.0", 100));
        Arc::new(OwnershipEngine::new(store, identity))
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_transfers_to_other_identities() {
        let store = Arc::new(MemoryStore::ready());
        let events = store.queue_subscription();
        let engine = engine_on(store.clone());

        let (guard, mut notices) = spawn_handoff_listener(engine);

        events
            .send(StoreEvent::Applied(OwnershipRecord::transfer(
                "someone-else:2.0",
                100,
            )))
            .await
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        assert!(notices.try_recv().is_err());
        assert_eq!(store.write_count(), 0);
        guard.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn reclaims_transfer_directed_at_us_exactly_once() {
        let store = Arc::new(MemoryStore::ready());
        let events = store.queue_subscription();
        let engine = engine_on(store.clone());

        let (guard, mut notices) = spawn_handoff_listener(engine);

        let transfer = OwnershipRecord::transfer("fleet-gitops:1.0", 100);
        events
            .send(StoreEvent::Applied(transfer.clone()))
            .await
            .unwrap();
        // redundant re-delivery of the same event
        events.send(StoreEvent::Applied(transfer)).await.unwrap();

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.record.owner_extension_name, "fleet-gitops:1.0");

        sleep(Duration::from_millis(100)).await;
        assert!(notices.try_recv().is_err());
        assert_eq!(store.write_count(), 1);

        let record = store.read().await.unwrap().unwrap();
        assert_eq!(record.owner_container_id, "abc123def456");
        guard.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_claims_already_carrying_our_container_id() {
        let store = Arc::new(MemoryStore::ready());
        let events = store.queue_subscription();
        let engine = engine_on(store.clone());

        let (guard, mut notices) = spawn_handoff_listener(engine);

        events
            .send(StoreEvent::Applied(OwnershipRecord::claim(
                "fleet-gitops:1.0",
                "abc123def456",
                100,
            )))
            .await
            .unwrap();

        sleep(Duration::from_millis(100)).await;
        assert!(notices.try_recv().is_err());
        assert_eq!(store.write_count(), 0);
        guard.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_watch_close() {
        let store = Arc::new(MemoryStore::ready());
        let first = store.queue_subscription();
        let second = store.queue_subscription();
        let engine = engine_on(store.clone());

        let (guard, mut notices) = spawn_handoff_listener(engine);

        first
            .send(StoreEvent::Closed("stream reset".to_string()))
            .await
            .unwrap();

        // past the reconnect backoff; the second subscription is live
        sleep(Duration::from_secs(6)).await;
        second
            .send(StoreEvent::Applied(OwnershipRecord::transfer(
                "fleet-gitops:1.0",
                100,
            )))
            .await
            .unwrap();

        let notice = notices.recv().await.unwrap();
        assert!(notice.record.is_pending_reclaim());
        guard.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_processing() {
        let store = Arc::new(MemoryStore::ready());
        let events = store.queue_subscription();
        let engine = engine_on(store.clone());

        let (guard, mut notices) = spawn_handoff_listener(engine);
        sleep(Duration::from_millis(10)).await;

        guard.stop();
        guard.stop(); // idempotent
        sleep(Duration::from_millis(10)).await;

        let _ = events
            .send(StoreEvent::Applied(OwnershipRecord::transfer(
                "fleet-gitops:1.0",
                100,
            )))
            .await;

        sleep(Duration::from_secs(10)).await;
        assert!(notices.try_recv().is_err());
        assert_eq!(store.write_count(), 0);
    }
}

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use fgo_model::{OwnershipRecord, StoreError, StoreEvent};

use crate::traits::OwnershipStore;

/// In-memory store fake for engine and listener tests.
///
/// Watch subscriptions are scripted: each [`MemoryStore::queue_subscription`]
/// call prepares one channel whose sender the test drives; `subscribe` hands
/// the receivers out in order. Without a queued subscription, `subscribe`
/// returns an immediately-closed stream.
pub struct MemoryStore {
    ready: AtomicBool,
    record: Mutex<Option<OwnershipRecord>>,
    writes: AtomicUsize,
    read_error: Mutex<Option<String>>,
    subscriptions: Mutex<VecDeque<mpsc::Receiver<StoreEvent>>>,
}

impl MemoryStore {
    pub fn ready() -> Self {
        Self::with_ready(true)
    }

    pub fn not_ready() -> Self {
        Self::with_ready(false)
    }

    fn with_ready(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            record: Mutex::new(None),
            writes: AtomicUsize::new(0),
            read_error: Mutex::new(None),
            subscriptions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_record(&self, record: OwnershipRecord) {
        *self.record.lock().unwrap() = Some(record);
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, message: &str) {
        *self.read_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn queue_subscription(&self) -> mpsc::Sender<StoreEvent> {
        let (tx, rx) = mpsc::channel(16);
        self.subscriptions.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl OwnershipStore for MemoryStore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn read(&self) -> Result<Option<OwnershipRecord>, StoreError> {
        if let Some(message) = self.read_error.lock().unwrap().clone() {
            return Err(StoreError::Transient(message));
        }
        Ok(self.record.lock().unwrap().clone())
    }

    async fn write(&self, record: &OwnershipRecord) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    async fn subscribe(
        &self,
        _cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StoreEvent>, StoreError> {
        if !self.is_ready() {
            return Err(StoreError::NotReady);
        }
        let queued = self.subscriptions.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| mpsc::channel(1).1))
    }
}

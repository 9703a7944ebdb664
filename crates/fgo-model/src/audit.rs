use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const DEFAULT_CAPACITY: usize = 100;

/// Bounded in-memory audit log for operator troubleshooting.
///
/// Each service keeps one; entries are timestamped strings exposed through
/// `OwnershipStatus.debug_log` and the debug endpoint. Oldest entries are
/// dropped once the capacity is reached. Handles are cheap to clone and
/// share one underlying buffer.
#[derive(Clone)]
pub struct AuditLog {
    inner: Arc<RwLock<VecDeque<String>>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a timestamped entry, evicting the oldest when full.
    pub fn push(&self, message: impl AsRef<str>) {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let entry = format!("[{stamp}] {}", message.as_ref());

        let mut buf = self.inner.write().unwrap();
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(entry);
    }

    /// Current entries, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.read().unwrap().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

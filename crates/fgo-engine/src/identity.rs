use std::sync::RwLock;

/// This instance's coordinates in the protocol.
///
/// The container ID is fixed for the process lifetime (the in-container
/// hostname). The extension name starts from configuration and may be
/// corrected once the identity resolver has cross-checked the Docker
/// inventory, hence the lock.
pub struct Identity {
    container_id: String,
    priority: i64,
    extension_name: RwLock<String>,
}

impl Identity {
    pub fn new(
        container_id: impl Into<String>,
        extension_name: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            priority,
            extension_name: RwLock::new(extension_name.into()),
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn extension_name(&self) -> String {
        self.extension_name.read().unwrap().clone()
    }

    pub fn set_extension_name(&self, name: impl Into<String>) {
        *self.extension_name.write().unwrap() = name.into();
    }
}

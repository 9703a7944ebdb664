mod record;
pub use record::{CONFIGMAP_NAME, DEFAULT_PRIORITY, NAMESPACE, OwnershipRecord};

mod extension;
pub use extension::InstalledExtension;

mod container;
pub use container::ContainerInfo;

mod status;
pub use status::{OwnershipState, OwnershipStatus};

mod audit;
pub use audit::AuditLog;

mod store;
pub use store::{StoreError, StoreEvent};

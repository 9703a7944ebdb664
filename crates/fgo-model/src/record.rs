use std::collections::BTreeMap;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Namespace holding the coordination ConfigMap.
pub const NAMESPACE: &str = "fleet-local";

/// Name of the coordination ConfigMap.
pub const CONFIGMAP_NAME: &str = "fleet-extension-ownership";

/// Advisory priority written when none is configured.
pub const DEFAULT_PRIORITY: i64 = 100;

const KEY_OWNER_NAME: &str = "ownerExtensionName";
const KEY_OWNER_CONTAINER: &str = "ownerContainerId";
const KEY_CLAIMED_AT: &str = "claimedAt";
const KEY_PRIORITY: &str = "ownerPriority";

/// The coordination record persisted in the shared ConfigMap.
///
/// The record is advisory: it selects which instance *attempts* Fleet
/// management, it does not mutually exclude cluster mutations. An empty
/// `owner_container_id` is the pending-reclaim sentinel left by an explicit
/// transfer; the named owner is expected to write its own container ID back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub owner_extension_name: String,
    pub owner_container_id: String,
    /// RFC3339 timestamp of the last claim. Diagnostics only.
    pub claimed_at: String,
    /// Advisory weight, carried through but not used to break ties.
    pub owner_priority: i64,
}

impl OwnershipRecord {
    /// Build a fresh claim for the given owner.
    pub fn claim(owner: impl Into<String>, container_id: impl Into<String>, priority: i64) -> Self {
        Self {
            owner_extension_name: owner.into(),
            owner_container_id: container_id.into(),
            claimed_at: now_rfc3339(),
            owner_priority: priority,
        }
    }

    /// Build a transfer record: the new owner is named but has not yet
    /// reclaimed, so the container ID is left empty.
    pub fn transfer(new_owner: impl Into<String>, priority: i64) -> Self {
        Self::claim(new_owner, "", priority)
    }

    /// True when the record awaits a reclaim by the named owner.
    pub fn is_pending_reclaim(&self) -> bool {
        self.owner_container_id.is_empty()
    }

    /// Decode from ConfigMap `data`. Missing keys fall back to defaults so a
    /// hand-edited or partially written map never fails the decision path.
    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        Self {
            owner_extension_name: data.get(KEY_OWNER_NAME).cloned().unwrap_or_default(),
            owner_container_id: data.get(KEY_OWNER_CONTAINER).cloned().unwrap_or_default(),
            claimed_at: data.get(KEY_CLAIMED_AT).cloned().unwrap_or_default(),
            owner_priority: data
                .get(KEY_PRIORITY)
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PRIORITY),
        }
    }

    /// Encode as string-valued ConfigMap `data`.
    pub fn to_data(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_OWNER_NAME.to_string(), self.owner_extension_name.clone()),
            (KEY_OWNER_CONTAINER.to_string(), self.owner_container_id.clone()),
            (KEY_CLAIMED_AT.to_string(), self.claimed_at.clone()),
            (KEY_PRIORITY.to_string(), self.owner_priority.to_string()),
        ])
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

use serde::{Deserialize, Serialize};

/// Terminal outcome of one ownership decision, plus the surface-only states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OwnershipState {
    Claimed,
    Reclaimed,
    Yielded,
    /// Kept for parity with the frontend's status union. The backend never
    /// emits it: a decision that entered the grace period runs it to
    /// completion inside one call and reports `yielded` or `taken-over`.
    Waiting,
    TakenOver,
    Error,
    /// No decision yet: initialization has not arrived from the frontend.
    Pending,
}

/// Full ownership status returned by every decision and exposed over HTTP.
///
/// `message` is a human-readable sentence naming which branch fired and why;
/// it is displayed verbatim in the operator status panel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipStatus {
    pub is_owner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_owner: Option<String>,
    pub own_container_id: String,
    pub own_extension_name: String,
    pub status: OwnershipState,
    pub message: String,
    pub debug_log: Vec<String>,
}

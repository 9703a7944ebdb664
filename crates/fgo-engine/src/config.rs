use std::time::Duration;

/// Engine timing knobs. Defaults match the production protocol; tests dial
/// them down or run under a paused clock.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Grace period granted to a recorded owner whose container is not yet
    /// running before taking over.
    pub wait_timeout: Duration,
    /// Polling interval for the running check during the grace period.
    pub poll_interval: Duration,
    /// Delay between watch reconnect attempts in the handoff listener.
    pub reconnect_backoff: Duration,
    /// Quiet window after a reactive reclaim during which duplicate
    /// deliveries of the processed transfer event are ignored.
    pub reclaim_cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            reconnect_backoff: Duration::from_secs(5),
            reclaim_cooldown: Duration::from_secs(2),
        }
    }
}

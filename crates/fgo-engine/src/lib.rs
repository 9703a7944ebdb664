mod traits;
pub use traits::{OwnershipStore, RunningProbe};

mod config;
pub use config::EngineConfig;

mod identity;
pub use identity::Identity;

mod engine;
pub use engine::OwnershipEngine;

mod listener;
pub use listener::{HandoffGuard, HandoffNotice, spawn_handoff_listener};

#[cfg(test)]
mod testutil;

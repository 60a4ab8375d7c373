//! Engine tunables.

use serde::{Deserialize, Serialize};

/// Configuration for engine behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many times a script re-runs after a conflicting commit before the
    /// operation fails with `StoreUnavailable`.
    pub max_conflict_retries: u32,
    /// Buffered events per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
    /// Lock window used when neither the caller nor the `heartbeat` option
    /// gives one (seconds).
    pub default_heartbeat_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 32,
            event_capacity: 1024,
            default_heartbeat_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_default_heartbeat(mut self, secs: i64) -> Self {
        self.default_heartbeat_secs = secs;
        self
    }
}

//! Queue-level types: names and per-state counts.

use serde::{Deserialize, Serialize};

use crate::{JobState, QueueError};

/// Check a queue name before it reaches the store.
pub fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    if name.trim().is_empty() {
        return Err(QueueError::InvalidArgument("queue name must not be empty".into()));
    }
    if name.chars().any(char::is_control) {
        return Err(QueueError::InvalidArgument(format!(
            "queue name {name:?} contains control characters"
        )));
    }
    Ok(())
}

/// Job counts for one queue, by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub waiting: u64,
    pub locked: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Count one job in `state`.
    pub fn record(&mut self, state: JobState) {
        self.add(state, 1);
    }

    /// Add `count` jobs in `state`.
    pub fn add(&mut self, state: JobState, count: u64) {
        match state {
            JobState::Waiting => self.waiting += count,
            JobState::Locked => self.locked += count,
            JobState::Completed => self.completed += count,
            JobState::Failed => self.failed += count,
        }
    }

    /// Jobs still in the queue (waiting + locked). This is the queue length.
    pub fn active(&self) -> u64 {
        self.waiting + self.locked
    }

    /// Total processed jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.processed();
        if total == 0 {
            None
        } else {
            Some((self.completed as f64 / total as f64) * 100.0)
        }
    }
}

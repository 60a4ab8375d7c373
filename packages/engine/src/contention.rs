//! Retry budget for scripts whose commit lost a revision race.

use relq_core::QueueError;

pub(crate) struct Contention {
    op: &'static str,
    attempts: u32,
    limit: u32,
}

impl Contention {
    pub(crate) fn new(op: &'static str, limit: u32) -> Self {
        Self {
            op,
            attempts: 0,
            limit,
        }
    }

    /// Record a conflicting commit. Errors once the budget is spent.
    pub(crate) async fn conflicted(&mut self) -> Result<(), QueueError> {
        self.attempts += 1;
        if self.attempts > self.limit {
            tracing::warn!(
                op = self.op,
                attempts = self.attempts,
                "giving up after repeated commit conflicts"
            );
            return Err(QueueError::StoreUnavailable(format!(
                "{}: {} conflicting commits in a row",
                self.op, self.attempts
            )));
        }
        tracing::debug!(op = self.op, attempt = self.attempts, "commit conflict, re-running");
        tokio::task::yield_now().await;
        Ok(())
    }
}

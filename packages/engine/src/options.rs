//! Named queue options kept in the store.

use std::collections::BTreeMap;
use std::sync::Arc;

use relq_core::{QueueError, validate_ttl};
use relq_db::AtomicStore;

use crate::engine::Shared;

/// Option holding the default lock window in seconds.
pub const HEARTBEAT_OPTION: &str = "heartbeat";

/// Get / set access to option strings. An absent option is simply not set.
pub struct ConfigStore<S: AtomicStore> {
    shared: Arc<Shared<S>>,
}

fn validate_name(name: &str) -> Result<(), QueueError> {
    if name.is_empty() {
        return Err(QueueError::InvalidArgument("option name must not be empty".into()));
    }
    Ok(())
}

impl<S: AtomicStore> ConfigStore<S> {
    pub(crate) fn new(shared: Arc<Shared<S>>) -> Self {
        Self { shared }
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>, QueueError> {
        validate_name(name)?;
        Ok(self.shared.store.config_get(name).await?)
    }

    pub async fn all(&self) -> Result<BTreeMap<String, String>, QueueError> {
        Ok(self.shared.store.config_all().await?)
    }

    /// Set `name`, or remove it when `value` is `None`.
    pub async fn set(&self, name: &str, value: Option<&str>) -> Result<(), QueueError> {
        validate_name(name)?;
        self.shared.store.config_set(name, value).await?;
        tracing::debug!(option = name, value, "option updated");
        Ok(())
    }

    pub async fn unset(&self, name: &str) -> Result<(), QueueError> {
        self.set(name, None).await
    }

    /// The default lock window. Falls back to the engine default when the
    /// option is missing or unusable.
    pub async fn heartbeat_secs(&self) -> Result<i64, QueueError> {
        let fallback = self.shared.config.default_heartbeat_secs;
        let Some(raw) = self.get(HEARTBEAT_OPTION).await? else {
            return Ok(fallback);
        };
        match raw.trim().parse::<i64>().ok().and_then(|secs| validate_ttl(secs).ok()) {
            Some(secs) => Ok(secs),
            None => {
                tracing::warn!(
                    option = HEARTBEAT_OPTION,
                    value = %raw,
                    fallback,
                    "ignoring malformed option"
                );
                Ok(fallback)
            }
        }
    }
}

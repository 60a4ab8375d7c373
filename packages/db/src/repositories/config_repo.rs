//! Queue option persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Database, StoreError};

/// Repository for named queue options.
pub struct ConfigRepository<'a> {
    db: &'a Database,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigRow {
    name: String,
    value: String,
}

impl<'a> ConfigRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let row: Option<ConfigRow> = self.db.select(("queue_config", name.to_string())).await?;
        Ok(row.map(|r| r.value))
    }

    pub async fn all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let rows: Vec<ConfigRow> = self.db.select("queue_config").await?;
        Ok(rows.into_iter().map(|r| (r.name, r.value)).collect())
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let _: Option<ConfigRow> = self
            .db
            .upsert(("queue_config", name.to_string()))
            .content(ConfigRow {
                name: name.to_string(),
                value: value.to_string(),
            })
            .await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let _: Option<ConfigRow> = self.db.delete(("queue_config", name.to_string())).await?;
        Ok(())
    }
}

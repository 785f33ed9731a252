use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use shared::domain::ViewId;
use tokio::sync::{broadcast, RwLock};

use crate::{KeyValueStore, StorageChange, CHANGE_CHANNEL_CAPACITY};

/// Process-local store. Clones share the same slots and change channel.
#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
    quota_bytes: Option<usize>,
    changes: broadcast::Sender<StorageChange>,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            quota_bytes: None,
            changes,
        }
    }

    /// Rejects any write that would push the total size of keys and values
    /// above `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, origin: ViewId, key: &str, value: &str) -> Result<()> {
        {
            let mut entries = self.entries.write().await;
            if let Some(quota) = self.quota_bytes {
                let others: usize = entries
                    .iter()
                    .filter(|(existing, _)| existing.as_str() != key)
                    .map(|(existing, existing_value)| existing.len() + existing_value.len())
                    .sum();
                let needed = others + key.len() + value.len();
                if needed > quota {
                    bail!("storage quota exceeded writing '{key}': {needed} > {quota} bytes");
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }

        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            new_value: Some(value.to_string()),
            origin,
        });
        Ok(())
    }

    async fn remove(&self, origin: ViewId, key: &str) -> Result<()> {
        let removed = self.entries.write().await.remove(key);
        if removed.is_some() {
            let _ = self.changes.send(StorageChange {
                key: key.to_string(),
                new_value: None,
                origin,
            });
        }
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }
}

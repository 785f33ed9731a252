//! Durable key-value slots shared by every view of the quote page.
//!
//! A view writes through a [`KeyValueStore`] and every other view attached to
//! the same backing store observes the write as a [`StorageChange`].

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::ViewId;
use tokio::sync::broadcast;

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::{SqliteKvStore, StoredEntry};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A write observed on the store. `new_value` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<String>,
    pub origin: ViewId,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, origin: ViewId, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, origin: ViewId, key: &str) -> Result<()>;
    fn subscribe_changes(&self) -> broadcast::Receiver<StorageChange>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{QuoteCatalog, ReactionTable, ViewId},
    error::ReactionError,
    protocol::{encode_last_update, ViewMessage, LAST_UPDATE_KEY, REACTIONS_KEY},
};
use storage::{KeyValueStore, StorageChange};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::channel::{ChannelEnvelope, NamedChannel};

/// Slot names in the persisted store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreKeys {
    pub reactions: String,
    pub last_update: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            reactions: REACTIONS_KEY.into(),
            last_update: LAST_UPDATE_KEY.into(),
        }
    }
}

/// Reaction counts for one view: durable storage plus propagation to the
/// other views sharing the same store.
#[derive(Clone)]
pub struct ReactionStore {
    view_id: ViewId,
    kv: Arc<dyn KeyValueStore>,
    channel: Option<NamedChannel>,
    keys: StoreKeys,
    catalog: Arc<QuoteCatalog>,
}

impl ReactionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, catalog: Arc<QuoteCatalog>) -> Self {
        Self {
            view_id: ViewId::new(),
            kv,
            channel: None,
            keys: StoreKeys::default(),
            catalog,
        }
    }

    pub fn with_channel(mut self, channel: NamedChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_keys(mut self, keys: StoreKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    pub fn catalog(&self) -> Arc<QuoteCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Reads the persisted table, falls back to an empty one when it is
    /// missing or unreadable, backfills every quote from its seed counts and
    /// writes the result back.
    pub async fn load(&self) -> ReactionTable {
        let mut table = match self.kv.get(&self.keys.reactions).await {
            Ok(Some(raw)) => match self.parse_persisted(&raw) {
                Ok(table) => table,
                Err(err) => {
                    warn!(view_id = %self.view_id, error = %err, "reactions: starting from defaults");
                    ReactionTable::new()
                }
            },
            Ok(None) => ReactionTable::new(),
            Err(err) => {
                warn!(
                    view_id = %self.view_id,
                    key = %self.keys.reactions,
                    error = %format!("{err:#}"),
                    "reactions: persisted slot unreadable; starting from defaults"
                );
                ReactionTable::new()
            }
        };

        if table.backfill(&self.catalog) {
            debug!(view_id = %self.view_id, entries = table.len(), "reactions: backfilled defaults");
        }
        self.save(&table).await;
        info!(view_id = %self.view_id, entries = table.len(), "reactions: loaded");
        table
    }

    /// Writes the table, reporting failures to the caller.
    pub async fn try_save(&self, table: &ReactionTable) -> Result<(), ReactionError> {
        let raw = serde_json::to_string(table).map_err(|err| {
            ReactionError::PersistenceWriteFailed {
                key: self.keys.reactions.clone(),
                reason: err.to_string(),
            }
        })?;
        self.kv
            .set(self.view_id, &self.keys.reactions, &raw)
            .await
            .map_err(|err| ReactionError::PersistenceWriteFailed {
                key: self.keys.reactions.clone(),
                reason: format!("{err:#}"),
            })
    }

    /// Writes the table. A failed write is logged and otherwise ignored; the
    /// caller's in-memory table stays authoritative. Returns whether the write
    /// landed.
    pub async fn save(&self, table: &ReactionTable) -> bool {
        match self.try_save(table).await {
            Ok(()) => true,
            Err(err) => {
                warn!(view_id = %self.view_id, error = %err, "reactions: keeping in-memory state");
                false
            }
        }
    }

    /// Tells the other views the table changed: over the named channel when
    /// one is attached, otherwise by touching the last-update slot.
    pub async fn broadcast(&self, table: &ReactionTable) {
        match &self.channel {
            Some(channel) => match ViewMessage::ReactionsUpdated(table.clone()).encode() {
                Ok(data) => channel.post(self.view_id, data),
                Err(err) => {
                    warn!(view_id = %self.view_id, error = %err, "reactions: failed to encode broadcast")
                }
            },
            None => {
                let stamp = encode_last_update(Utc::now());
                if let Err(err) = self
                    .kv
                    .set(self.view_id, &self.keys.last_update, &stamp)
                    .await
                {
                    warn!(
                        view_id = %self.view_id,
                        key = %self.keys.last_update,
                        error = %format!("{err:#}"),
                        "reactions: failed to signal update through store"
                    );
                }
            }
        }
    }

    /// Stream of tables written by other views. Subscribes immediately, so
    /// nothing posted after this call is missed.
    pub fn external_updates(&self) -> ExternalUpdates {
        ExternalUpdates {
            store: self.clone(),
            channel_rx: self.channel.as_ref().map(NamedChannel::subscribe),
            storage_rx: self.kv.subscribe_changes(),
        }
    }

    /// Calls `callback` with every table written by another view until the
    /// returned task is aborted.
    pub fn on_external_update<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(ReactionTable) + Send + 'static,
    {
        let mut updates = self.external_updates();
        tokio::spawn(async move {
            while let Some(table) = updates.next().await {
                callback(table);
            }
        })
    }

    fn parse_persisted(&self, raw: &str) -> Result<ReactionTable, ReactionError> {
        serde_json::from_str(raw).map_err(|err| ReactionError::PersistedDataCorrupt {
            key: self.keys.reactions.clone(),
            reason: err.to_string(),
        })
    }

    fn parse_broadcast(&self, channel: &str, raw: &str) -> Result<ReactionTable, ReactionError> {
        match ViewMessage::decode(raw) {
            Ok(ViewMessage::ReactionsUpdated(table)) => Ok(table),
            Err(err) => Err(ReactionError::BroadcastPayloadMalformed {
                channel: channel.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

enum Incoming {
    Channel(Result<ChannelEnvelope, RecvError>),
    Storage(Result<StorageChange, RecvError>),
}

pub struct ExternalUpdates {
    store: ReactionStore,
    channel_rx: Option<broadcast::Receiver<ChannelEnvelope>>,
    storage_rx: broadcast::Receiver<StorageChange>,
}

impl ExternalUpdates {
    /// Next table from another view, already backfilled against the catalog.
    /// Own writes, malformed payloads and removals are skipped.
    ///
    /// Not cancel safe: a last-update signal is resolved with a store read
    /// after it has been taken off the queue.
    pub async fn next(&mut self) -> Option<ReactionTable> {
        loop {
            let incoming = tokio::select! {
                envelope = recv_channel(&mut self.channel_rx) => Incoming::Channel(envelope),
                change = self.storage_rx.recv() => Incoming::Storage(change),
            };

            let table = match incoming {
                Incoming::Channel(Ok(envelope)) => self.from_channel(envelope),
                Incoming::Channel(Err(RecvError::Lagged(skipped))) => {
                    warn!(view_id = %self.store.view_id, skipped, "reactions: channel receiver lagged");
                    None
                }
                Incoming::Channel(Err(RecvError::Closed)) => {
                    self.channel_rx = None;
                    None
                }
                Incoming::Storage(Ok(change)) => self.from_storage(change).await,
                Incoming::Storage(Err(RecvError::Lagged(skipped))) => {
                    warn!(view_id = %self.store.view_id, skipped, "reactions: storage receiver lagged");
                    None
                }
                Incoming::Storage(Err(RecvError::Closed)) => return None,
            };

            if let Some(mut table) = table {
                table.backfill(&self.store.catalog);
                return Some(table);
            }
        }
    }

    fn from_channel(&self, envelope: ChannelEnvelope) -> Option<ReactionTable> {
        if envelope.origin == self.store.view_id {
            return None;
        }
        let channel = self
            .store
            .channel
            .as_ref()
            .map(NamedChannel::name)
            .unwrap_or_default();
        match self.store.parse_broadcast(channel, &envelope.data) {
            Ok(table) => {
                debug!(view_id = %self.store.view_id, origin = %envelope.origin, "reactions: update over channel");
                Some(table)
            }
            Err(err) => {
                warn!(view_id = %self.store.view_id, error = %err, "reactions: ignoring broadcast");
                None
            }
        }
    }

    async fn from_storage(&self, change: StorageChange) -> Option<ReactionTable> {
        if change.origin == self.store.view_id {
            return None;
        }
        let keys = &self.store.keys;
        let raw = if change.key == keys.reactions {
            change.new_value?
        } else if change.key == keys.last_update {
            match self.store.kv.get(&keys.reactions).await {
                Ok(value) => value?,
                Err(err) => {
                    warn!(
                        view_id = %self.store.view_id,
                        error = %format!("{err:#}"),
                        "reactions: failed to re-read after update signal"
                    );
                    return None;
                }
            }
        } else {
            return None;
        };

        match self.store.parse_persisted(&raw) {
            Ok(table) => {
                debug!(
                    view_id = %self.store.view_id,
                    origin = %change.origin,
                    key = %change.key,
                    "reactions: update through store"
                );
                Some(table)
            }
            Err(err) => {
                warn!(view_id = %self.store.view_id, error = %err, "reactions: ignoring store change");
                None
            }
        }
    }
}

async fn recv_channel(
    channel_rx: &mut Option<broadcast::Receiver<ChannelEnvelope>>,
) -> Result<ChannelEnvelope, RecvError> {
    match channel_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/reaction_store_tests.rs"]
mod tests;

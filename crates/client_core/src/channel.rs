//! Named in-process channels connecting concurrently open views.

use std::{collections::HashMap, sync::Arc};

use shared::domain::ViewId;
use tokio::sync::{broadcast, Mutex};

const CHANNEL_CAPACITY: usize = 256;

/// Raw message as posted by a view. `data` is decoded by the receiver so a
/// malformed payload only affects the view that reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEnvelope {
    pub origin: ViewId,
    pub data: String,
}

/// Registry of named channels. Views opening the same name talk to each other.
#[derive(Clone, Default)]
pub struct ChannelHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<ChannelEnvelope>>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, name: &str) -> NamedChannel {
        let mut channels = self.channels.lock().await;
        let sender = channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        NamedChannel {
            name: name.to_string(),
            sender,
        }
    }
}

#[derive(Clone)]
pub struct NamedChannel {
    name: String,
    sender: broadcast::Sender<ChannelEnvelope>,
}

impl NamedChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivers to every current subscriber, including the poster's own.
    pub fn post(&self, origin: ViewId, data: String) {
        let _ = self.sender.send(ChannelEnvelope { origin, data });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEnvelope> {
        self.sender.subscribe()
    }
}

use thiserror::Error;

/// Failure taxonomy for the reaction store and quote session.
///
/// Only `EmptyQuoteList` is fatal. The rest are recovered where they occur and
/// logged; `ControlMissing` describes a supported configuration.
#[derive(Debug, Error)]
pub enum ReactionError {
    #[error("persisted reactions under '{key}' are corrupt: {reason}")]
    PersistedDataCorrupt { key: String, reason: String },
    #[error("failed to persist reactions under '{key}': {reason}")]
    PersistenceWriteFailed { key: String, reason: String },
    #[error("malformed reactions broadcast on '{channel}': {reason}")]
    BroadcastPayloadMalformed { channel: String, reason: String },
    #[error("{control} control is not present; no handler attached")]
    ControlMissing { control: &'static str },
    #[error("quote list is empty; no quote can ever be shown")]
    EmptyQuoteList,
}

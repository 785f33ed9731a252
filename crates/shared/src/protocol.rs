use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ReactionTable;

pub const REACTIONS_KEY: &str = "quotes_reactions";
pub const LAST_UPDATE_KEY: &str = "quotes_reactions_last_update";
pub const CHANNEL_NAME: &str = "quotes_channel";

/// Message exchanged between views over a named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ViewMessage {
    ReactionsUpdated(ReactionTable),
}

impl ViewMessage {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Value written under the last-update key: milliseconds since the UNIX epoch.
pub fn encode_last_update(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

pub fn decode_last_update(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReactionRecord;

    #[test]
    fn reactions_updated_uses_type_and_payload_fields() {
        let mut table = ReactionTable::new();
        table.insert(
            3,
            ReactionRecord {
                likes: 1,
                dislikes: 0,
            },
        );
        let raw = ViewMessage::ReactionsUpdated(table.clone())
            .encode()
            .expect("encode");
        assert_eq!(
            raw,
            r#"{"type":"reactions_updated","payload":{"3":{"likes":1,"dislikes":0}}}"#
        );
        assert_eq!(
            ViewMessage::decode(&raw).expect("decode"),
            ViewMessage::ReactionsUpdated(table)
        );
    }

    #[test]
    fn rejects_unknown_message_types() {
        assert!(ViewMessage::decode(r#"{"type":"something_else","payload":{}}"#).is_err());
        assert!(ViewMessage::decode("not json").is_err());
    }

    #[test]
    fn last_update_stamp_is_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).single().expect("ts");
        let raw = encode_last_update(at);
        assert_eq!(raw, "1700000000123");
        assert_eq!(decode_last_update(&raw), Some(at));
        assert_eq!(decode_last_update("later"), None);
    }
}

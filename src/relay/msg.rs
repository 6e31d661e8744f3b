use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::RelayError;

use super::identity::PeerId;

/// Messages the relay originates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Init {
        #[serde(rename = "yourPeerId")]
        your_peer_id: PeerId,
    },
    Joined {
        #[serde(rename = "otherPeerIds")]
        other_peer_ids: Vec<PeerId>,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Messages a client may send. Anything else closes the connection.
///
/// Missing or non-string id fields read as empty, so they fail the id,
/// sender and routing checks instead of surfacing as parse errors.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Join {
        #[serde(default, deserialize_with = "string_or_empty")]
        room: String,
    },
    Signal {
        #[serde(default, deserialize_with = "string_or_empty")]
        room: String,
        #[serde(rename = "senderPeerId", default, deserialize_with = "string_or_empty")]
        sender_peer_id: String,
        #[serde(rename = "receiverPeerId", default, deserialize_with = "string_or_empty")]
        receiver_peer_id: String,
        #[serde(default)]
        data: Value,
    },
    Ping,
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(text)?;
        let Some(fields) = value.as_object() else {
            return Err(RelayError::Malformed("expected a JSON object".to_owned()));
        };

        match fields.get("type") {
            Some(Value::String(kind)) if matches!(kind.as_str(), "join" | "signal" | "ping") => {
                Ok(serde_json::from_value(value)?)
            }
            Some(Value::String(kind)) => Err(RelayError::UnknownType(kind.clone())),
            Some(other) => Err(RelayError::UnknownType(other.to_string())),
            None => Err(RelayError::Malformed("missing type".to_owned())),
        }
    }
}

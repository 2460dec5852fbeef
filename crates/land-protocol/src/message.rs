use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::StateUpdate;

/// `event.direction`: whether the event originated at the client or was
/// emitted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    FromClient,
    FromServer,
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> Self {
        match value {
            Direction::FromClient => 0,
            Direction::FromServer => 1,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Direction::FromClient),
            1 => Ok(Direction::FromServer),
            other => Err(format!("unknown event direction {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinFrame {
    pub request_id: String,
    pub land_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponseFrame {
    pub request_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub land_instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub direction: Direction,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFrame {
    pub request_id: String,
    pub type_identifier: String,
    /// Base64-encoded bytes, per the wire contract.
    pub payload: String,
}

impl ActionFrame {
    pub fn with_bytes(request_id: impl Into<String>, type_identifier: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            request_id: request_id.into(),
            type_identifier: type_identifier.into(),
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn decoded_payload(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingFrame {
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PongFrame {
    pub nonce: String,
}

/// Wraps a [`StateUpdate`] under its own field so the frame-level `kind` tag
/// (`"stateUpdate"`) never collides with the update's own internal tag
/// (`"firstSync"` / `"diff"` / `"noChange"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateFrame {
    pub update: StateUpdate,
}

/// The object-form (tagged-object) wire representation of every message
/// kind. Deserializing unknown trailing fields is handled automatically by
/// serde's default struct behavior (extra object keys are ignored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TransportMessage {
    #[serde(rename = "join")]
    Join(JoinFrame),
    #[serde(rename = "joinResponse")]
    JoinResponse(JoinResponseFrame),
    #[serde(rename = "event")]
    Event(EventFrame),
    #[serde(rename = "action")]
    Action(ActionFrame),
    #[serde(rename = "stateUpdate")]
    StateUpdate(StateUpdateFrame),
    #[serde(rename = "ping")]
    Ping(PingFrame),
    #[serde(rename = "pong")]
    Pong(PongFrame),
}

impl TransportMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportMessage::Join(_) => "join",
            TransportMessage::JoinResponse(_) => "joinResponse",
            TransportMessage::Event(_) => "event",
            TransportMessage::Action(_) => "action",
            TransportMessage::StateUpdate(_) => "stateUpdate",
            TransportMessage::Ping(_) => "ping",
            TransportMessage::Pong(_) => "pong",
        }
    }
}

use serde::Serialize;
use serde_json::Value;

use crate::error::BodyEncodeError;
use crate::message::TransportMessage;
use crate::opcode::OP_STATE_UPDATE_BUNDLE;
use crate::state::StateUpdate;

/// The wire shape a session negotiated at join time: tagged objects, or
/// positional opcode arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEncoding {
    Object,
    Opcode,
}

/// The body-level serialization family used for a frame's payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFamily {
    Json,
    MessagePack,
}

/// Encoding used for standalone (non-bundled) message frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEncoding {
    Json,
    MessagePack,
}

impl MessageEncoding {
    fn family(self) -> BodyFamily {
        match self {
            MessageEncoding::Json => BodyFamily::Json,
            MessageEncoding::MessagePack => BodyFamily::MessagePack,
        }
    }
}

/// Encoding used for the bodies embedded in an opcode-107 bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdateEncoding {
    OpcodeJson,
    OpcodeMessagePack,
}

impl StateUpdateEncoding {
    fn family(self) -> BodyFamily {
        match self {
            StateUpdateEncoding::OpcodeJson => BodyFamily::Json,
            StateUpdateEncoding::OpcodeMessagePack => BodyFamily::MessagePack,
        }
    }
}

/// The negotiated per-session encoding configuration (`session.encodingConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingConfig {
    pub message: MessageEncoding,
    pub state_update: StateUpdateEncoding,
}

impl EncodingConfig {
    pub fn new(message: MessageEncoding, state_update: StateUpdateEncoding) -> Self {
        Self { message, state_update }
    }

    /// Whether a broadcast server event encoded with `message` can be
    /// re-encoded losslessly into the bundle's body family. When the
    /// families differ we treat it as a codec mismatch and the caller must
    /// fall back to a standalone frame rather than drop the event.
    fn bundle_compatible(self) -> bool {
        self.message.family() == self.state_update.family()
    }
}

fn encode_body<T: Serialize>(value: &T, family: BodyFamily) -> Result<Vec<u8>, BodyEncodeError> {
    match family {
        BodyFamily::Json => serde_json::to_vec(value).map_err(|e| BodyEncodeError::Serialize(e.to_string())),
        BodyFamily::MessagePack => {
            rmp_serde::to_vec(value).map_err(|e| BodyEncodeError::Serialize(e.to_string()))
        }
    }
}

fn decode_body<T: serde::de::DeserializeOwned>(bytes: &[u8], family: BodyFamily) -> Result<T, BodyEncodeError> {
    match family {
        BodyFamily::Json => serde_json::from_slice(bytes).map_err(|e| BodyEncodeError::Serialize(e.to_string())),
        BodyFamily::MessagePack => {
            rmp_serde::from_slice(bytes).map_err(|e| BodyEncodeError::Serialize(e.to_string()))
        }
    }
}

/// A single server event queued for emission alongside a dirty cycle, before
/// the adapter has decided whether it can be bundled.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingServerEvent {
    pub message: TransportMessage,
    pub broadcast: bool,
}

/// The result of attempting to bundle a dirty cycle's broadcast events into
/// a single opcode-107 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleResult {
    /// `Some` only when there is a state update to send at all.
    pub bundle: Option<Vec<u8>>,
    /// Events that must be emitted as their own standalone frame: every
    /// non-broadcast event, plus any broadcast event whose body could not be
    /// re-encoded into the bundle's family.
    pub standalone: Vec<TransportMessage>,
}

/// Builds the opcode-107 `[107, stateUpdateBody, [serverEventBody, …]]`
/// frame for a dirty cycle, splitting out events that must fall back to
/// standalone frames. Never drops an event: anything that can't be bundled
/// is returned in `standalone`.
pub fn build_bundle(
    update: &StateUpdate,
    events: &[PendingServerEvent],
    config: EncodingConfig,
) -> Result<BundleResult, BodyEncodeError> {
    let update_family = config.state_update.family();
    let update_body = encode_body(update, update_family)?;

    let mut bundled_bodies = Vec::new();
    let mut standalone = Vec::new();

    for event in events {
        if !event.broadcast {
            standalone.push(event.message.clone());
            continue;
        }
        if !config.bundle_compatible() {
            standalone.push(event.message.clone());
            continue;
        }
        match encode_body(&event.message, update_family) {
            Ok(body) => bundled_bodies.push(body),
            Err(_) => standalone.push(event.message.clone()),
        }
    }

    let frame = serde_json::json!([
        OP_STATE_UPDATE_BUNDLE,
        base64_encode(&update_body),
        bundled_bodies.iter().map(|b| Value::String(base64_encode(b))).collect::<Vec<_>>(),
    ]);

    Ok(BundleResult {
        bundle: Some(serde_json::to_vec(&frame).map_err(|e| BodyEncodeError::Serialize(e.to_string()))?),
        standalone,
    })
}

/// Decodes an opcode-107 frame back into its state update and bundled
/// server events, given the same `state_update` encoding used to build it.
pub fn decode_bundle(
    frame: &[Value],
    state_update_encoding: StateUpdateEncoding,
) -> Result<(StateUpdate, Vec<TransportMessage>), BodyEncodeError> {
    let family = state_update_encoding.family();

    let update_body = frame
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| BodyEncodeError::Incompatible("missing state update body".to_owned()))?;
    let update_bytes = base64_decode(update_body)
        .map_err(|e| BodyEncodeError::Incompatible(format!("invalid base64: {e}")))?;
    let update: StateUpdate = decode_body(&update_bytes, family)?;

    let mut events = Vec::new();
    if let Some(Value::Array(items)) = frame.get(2) {
        for item in items {
            let body_str = item
                .as_str()
                .ok_or_else(|| BodyEncodeError::Incompatible("event body must be a string".to_owned()))?;
            let bytes = base64_decode(body_str)
                .map_err(|e| BodyEncodeError::Incompatible(format!("invalid base64: {e}")))?;
            events.push(decode_body(&bytes, family)?);
        }
    }

    Ok((update, events))
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(text)
}

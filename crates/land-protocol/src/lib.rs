//! Wire frame codec and state-sync sum types shared between a land's
//! transport adapter and every client.
//!
//! Two on-wire shapes carry the same [`TransportMessage`] sum type: tagged
//! objects (`object.rs`/[`message`]) and positional opcode arrays
//! ([`opcode`]). [`codec`] adds the opcode-107 bundled-update frame, which
//! embeds independently body-encoded blobs rather than plain fields.

pub mod codec;
pub mod error;
pub mod message;
pub mod opcode;
pub mod state;

pub use codec::{
    BodyFamily, BundleResult, EncodingConfig, MessageEncoding, PendingServerEvent, StateUpdateEncoding,
    WireEncoding,
};
pub use error::{BodyEncodeError, DecodeError};
pub use message::{
    ActionFrame, Direction, EventFrame, JoinFrame, JoinResponseFrame, PingFrame, PongFrame, StateUpdateFrame,
    TransportMessage,
};
pub use opcode::{OP_ACTION, OP_EVENT, OP_JOIN, OP_JOIN_RESPONSE, OP_STATE_UPDATE_BUNDLE};
pub use state::{apply_patches, diff, join_path, split_path, PatchOp, StatePatch, StateSnapshot, StateUpdate};

/// Encodes a [`TransportMessage`] for the wire in whichever shape the
/// session negotiated. `Opcode`-encoded `stateUpdate`/`ping`/`pong` messages
/// are rejected here: callers must go through [`codec::build_bundle`] for
/// bundled state updates, and must send heartbeats in object form.
pub fn encode(message: &TransportMessage, wire: WireEncoding) -> Result<Vec<u8>, DecodeError> {
    match wire {
        WireEncoding::Object => serde_json::to_vec(message)
            .map_err(|e| DecodeError::MalformedArray(format!("object encode failed: {e}"))),
        WireEncoding::Opcode => {
            let arr = opcode::encode_opcode(message)?;
            serde_json::to_vec(&arr).map_err(|e| DecodeError::MalformedArray(format!("opcode encode failed: {e}")))
        }
    }
}

/// Decodes a wire frame, auto-detecting object vs. opcode form from the
/// leading byte of the JSON payload (`{` vs `[`).
pub fn decode(bytes: &[u8]) -> Result<TransportMessage, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::MalformedArray(format!("invalid JSON: {e}")))?;
    match &value {
        serde_json::Value::Object(_) => {
            let kind = value
                .get("kind")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| DecodeError::UnknownKind("<missing>".to_owned()))?
                .to_owned();
            serde_json::from_value(value).map_err(|_| DecodeError::UnknownKind(kind))
        }
        serde_json::Value::Array(arr) => opcode::decode_opcode(arr),
        other => Err(DecodeError::MalformedArray(format!("expected object or array, got {other}"))),
    }
}

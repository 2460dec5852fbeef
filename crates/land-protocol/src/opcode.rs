use serde_json::{json, Map, Value};

use crate::error::DecodeError;
use crate::message::{ActionFrame, Direction, EventFrame, JoinFrame, JoinResponseFrame, TransportMessage};

pub const OP_ACTION: i64 = 101;
pub const OP_EVENT: i64 = 103;
pub const OP_JOIN: i64 = 104;
pub const OP_JOIN_RESPONSE: i64 = 105;
pub const OP_STATE_UPDATE_BUNDLE: i64 = 107;

/// Encodes the non-bundled message kinds to their positional opcode-array
/// form. `stateUpdate` has no standalone opcode of its own: it is only ever
/// carried bundled under opcode 107 (see [`crate::codec`]), and `ping`/`pong`
/// have no assigned opcode and must travel in object form.
pub fn encode_opcode(message: &TransportMessage) -> Result<Vec<Value>, DecodeError> {
    match message {
        TransportMessage::Action(ActionFrame { request_id, type_identifier, payload }) => Ok(vec![
            json!(OP_ACTION),
            json!(request_id),
            json!(type_identifier),
            json!(payload),
        ]),
        TransportMessage::Event(EventFrame { direction, event_type, payload, raw_body }) => {
            let mut arr = vec![
                json!(OP_EVENT),
                json!(u8::from(*direction)),
                json!(event_type),
                payload.clone(),
            ];
            if let Some(raw) = raw_body {
                arr.push(json!(raw));
            }
            Ok(arr)
        }
        TransportMessage::Join(JoinFrame {
            request_id,
            land_type,
            land_instance_id,
            player_id,
            device_id,
            metadata,
        }) => Ok(vec![
            json!(OP_JOIN),
            json!(request_id),
            json!(land_type),
            json!(land_instance_id),
            json!(player_id),
            json!(device_id),
            json!(metadata),
        ]),
        TransportMessage::JoinResponse(JoinResponseFrame {
            request_id,
            success,
            land_type,
            land_instance_id,
            player_slot,
            encoding,
            reason,
        }) => Ok(vec![
            json!(OP_JOIN_RESPONSE),
            json!(request_id),
            json!(success),
            json!(land_type),
            json!(land_instance_id),
            json!(player_slot),
            json!(encoding),
            json!(reason),
        ]),
        TransportMessage::StateUpdate(_) => Err(DecodeError::MalformedArray(
            "stateUpdate has no standalone opcode; use the opcode-107 bundle encoder".to_owned(),
        )),
        TransportMessage::Ping(_) | TransportMessage::Pong(_) => Err(DecodeError::MalformedArray(
            "ping/pong have no assigned opcode; send using the object form".to_owned(),
        )),
    }
}

pub fn decode_opcode(arr: &[Value]) -> Result<TransportMessage, DecodeError> {
    let opcode = arr
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| DecodeError::MalformedArray("missing leading opcode".to_owned()))?;

    match opcode {
        OP_ACTION => {
            if arr.len() < 4 {
                return Err(DecodeError::MalformedArray("action requires 4 elements".to_owned()));
            }
            Ok(TransportMessage::Action(ActionFrame {
                request_id: string_field(&arr[1], "requestId")?,
                type_identifier: string_field(&arr[2], "typeIdentifier")?,
                payload: string_field(&arr[3], "payload")?,
            }))
        }
        OP_EVENT => {
            if arr.len() < 4 {
                return Err(DecodeError::MalformedArray("event requires at least 4 elements".to_owned()));
            }
            let direction_num = arr[1]
                .as_u64()
                .ok_or_else(|| DecodeError::MalformedArray("direction must be an integer".to_owned()))?;
            let direction = Direction::try_from(direction_num as u8)
                .map_err(DecodeError::MalformedArray)?;
            let event_type = string_field(&arr[2], "type")?;
            let payload = arr[3].clone();
            let raw_body = arr.get(4).and_then(Value::as_str).map(ToOwned::to_owned);
            Ok(TransportMessage::Event(EventFrame { direction, event_type, payload, raw_body }))
        }
        OP_JOIN => {
            if arr.len() < 3 {
                return Err(DecodeError::MalformedArray("join requires at least 3 elements".to_owned()));
            }
            Ok(TransportMessage::Join(JoinFrame {
                request_id: string_field(&arr[1], "requestId")?,
                land_type: string_field(&arr[2], "landType")?,
                land_instance_id: opt_string(arr.get(3)),
                player_id: opt_string(arr.get(4)),
                device_id: opt_string(arr.get(5)),
                metadata: arr.get(6).and_then(Value::as_object).cloned().unwrap_or_else(Map::new),
            }))
        }
        OP_JOIN_RESPONSE => {
            if arr.len() < 3 {
                return Err(DecodeError::MalformedArray(
                    "joinResponse requires at least 3 elements".to_owned(),
                ));
            }
            let success = arr[2]
                .as_bool()
                .ok_or_else(|| DecodeError::MalformedArray("success must be a bool".to_owned()))?;
            Ok(TransportMessage::JoinResponse(JoinResponseFrame {
                request_id: string_field(&arr[1], "requestId")?,
                success,
                land_type: opt_string(arr.get(3)),
                land_instance_id: opt_string(arr.get(4)),
                player_slot: opt_string(arr.get(5)),
                encoding: opt_string(arr.get(6)),
                reason: opt_string(arr.get(7)),
            }))
        }
        OP_STATE_UPDATE_BUNDLE => Err(DecodeError::MalformedArray(
            "opcode 107 carries body-encoded blobs; decode via crate::codec::decode_bundle".to_owned(),
        )),
        other => Err(DecodeError::InvalidOpcode(other)),
    }
}

fn string_field(value: &Value, name: &str) -> Result<String, DecodeError> {
    value
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| DecodeError::MalformedArray(format!("expected string for {name}")))
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ActionFrame, PingFrame};
    use serde_json::json;

    #[test]
    fn action_round_trips_through_opcode_form() {
        let msg = TransportMessage::Action(ActionFrame::with_bytes("r1", "ping", b"hi"));
        let arr = encode_opcode(&msg).unwrap();
        assert_eq!(decode_opcode(&arr).unwrap(), msg);
    }

    #[test]
    fn join_round_trips_with_optional_fields_absent() {
        let msg = TransportMessage::Join(JoinFrame {
            request_id: "r1".to_owned(),
            land_type: "test-land".to_owned(),
            land_instance_id: None,
            player_id: None,
            device_id: None,
            metadata: Map::new(),
        });
        let arr = encode_opcode(&msg).unwrap();
        assert_eq!(decode_opcode(&arr).unwrap(), msg);
    }

    #[test]
    fn too_short_array_rejects_with_malformed_array() {
        let arr = vec![json!(OP_ACTION), json!("r1")];
        assert!(matches!(decode_opcode(&arr), Err(DecodeError::MalformedArray(_))));
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let arr = vec![json!(999)];
        assert_eq!(decode_opcode(&arr), Err(DecodeError::InvalidOpcode(999)));
    }

    #[test]
    fn ping_has_no_opcode_encoding() {
        let msg = TransportMessage::Ping(PingFrame { nonce: "n".to_owned() });
        assert!(encode_opcode(&msg).is_err());
    }
}

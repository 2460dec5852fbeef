use thiserror::Error;

/// Decode-side failures for the opcode (array) wire form.
///
/// Unknown trailing fields in the object form are ignored for forward
/// compatibility and never produce an error; only the opcode form's fixed
/// positional layout can be malformed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode {0}")]
    InvalidOpcode(i64),
    #[error("malformed opcode array: {0}")]
    MalformedArray(String),
    #[error("unknown message kind: {0}")]
    UnknownKind(String),
}

/// Body-level (MessagePack/JSON) (re-)encode failures, surfaced only when
/// bundling server events into an opcode-107 frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BodyEncodeError {
    #[error("incompatible body encoding for bundling: {0}")]
    Incompatible(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
}

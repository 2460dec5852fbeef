use land_keeper::{EventError, JoinError};
use land_protocol::{BodyEncodeError, DecodeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no subscriber registered for this session")]
    UnknownSession,
    #[error("session has not completed the join handshake")]
    NotJoined,
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    BodyEncode(#[from] BodyEncodeError),
    #[error("sending to the underlying transport failed: {0}")]
    Send(String),
}

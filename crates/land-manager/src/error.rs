use thiserror::Error;

/// Router-level failures — distinct from [`land_transport::TransportError`],
/// which belongs to a single land's adapter.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A `join` arrived on a session already bound to a different land.
    /// The router answers with `joinResponse{success:false,
    /// reason:"already-bound"}` itself; this variant is only returned when
    /// that response could not be sent.
    #[error("session is already bound to a different land")]
    AlreadyBound,

    /// The first message on an unbound session was not a `join` frame.
    #[error("expected a join frame to bind this session to a land")]
    MismatchedLand,

    /// The `join` named a `landType` with no registered factory.
    #[error("no land type registered for {0:?}")]
    UnknownLandType(String),

    /// The session hasn't called `onConnect` yet.
    #[error("session is not connected")]
    UnknownSession,

    #[error(transparent)]
    Decode(#[from] land_protocol::DecodeError),

    #[error(transparent)]
    Transport(#[from] land_transport::TransportError),
}

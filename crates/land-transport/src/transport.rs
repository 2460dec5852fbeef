use async_trait::async_trait;
use land_keeper::SessionID;

/// The collaborator that actually owns the wire: a WebSocket handle, a test
/// double, whatever carries bytes to one session. [`crate::adapter::TransportAdapter`]
/// depends only on this trait, never on a concrete transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, session_id: &SessionID, bytes: Vec<u8>) -> Result<(), String>;

    async fn disconnect(&self, session_id: &SessionID);
}

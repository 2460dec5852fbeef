use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use land_keeper::{AuthenticatedInfo, ClientID, LandKeeper, LandState, SessionID};
use land_protocol::{EncodingConfig, WireEncoding};
use land_transport::{TransportAdapter, TransportError};

/// The manager's type-erased view of one running land. Every land type has
/// its own concrete `LandState`, so the manager can't hold `LandKeeper<S>`
/// or `TransportAdapter<S>` directly — it holds this instead, implemented
/// once per `S` by [`LandRuntime`].
#[async_trait]
pub trait LandHandle: Send + Sync {
    async fn on_connect(
        &self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        auth_info: Option<AuthenticatedInfo>,
    ) -> Result<(), TransportError>;

    async fn on_message(&self, session_id: &SessionID, bytes: &[u8]) -> Result<(), TransportError>;

    async fn on_disconnect(&self, session_id: &SessionID);

    async fn is_joined(&self, session_id: &SessionID) -> bool;

    /// Sends a failing `joinResponse` without touching this land's keeper —
    /// used by the router to reject a join aimed at a different land than
    /// the one a session is already bound to.
    async fn reject_join(&self, session_id: &SessionID, request_id: &str, reason: &str) -> Result<(), TransportError>;

    async fn player_count(&self) -> usize;

    /// Every session currently registered against this land — used to
    /// force-disconnect everyone when the land is removed.
    async fn session_ids(&self) -> Vec<SessionID>;
}

/// Binds one land type's `LandKeeper<S>` + `TransportAdapter<S>` pair, plus
/// the opaque `services` handed to every keeper/adapter call, into a
/// [`LandHandle`] trait object the manager and router can hold uniformly.
pub struct LandRuntime<S: LandState + Clone + 'static> {
    keeper: Arc<LandKeeper<S>>,
    adapter: Arc<TransportAdapter<S>>,
    services: Arc<dyn Any + Send + Sync>,
}

impl<S: LandState + Clone + 'static> LandRuntime<S> {
    /// Wires `adapter` as the keeper's effect sink and returns the bound
    /// runtime. `services` is threaded opaquely through to every rule
    /// context — this crate never inspects it.
    pub async fn new(
        keeper: Arc<LandKeeper<S>>,
        adapter: Arc<TransportAdapter<S>>,
        services: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        keeper.set_transport(adapter.clone()).await;
        Self { keeper, adapter, services }
    }

    /// Convenience for the common case where a land needs no services
    /// beyond what the keeper and adapter already carry.
    pub async fn new_without_services(keeper: Arc<LandKeeper<S>>, adapter: Arc<TransportAdapter<S>>) -> Self {
        Self::new(keeper, adapter, Arc::new(())).await
    }
}

#[async_trait]
impl<S: LandState + Clone + 'static> LandHandle for LandRuntime<S> {
    async fn on_connect(
        &self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        auth_info: Option<AuthenticatedInfo>,
    ) -> Result<(), TransportError> {
        self.adapter.on_connect(session_id, client_id, wire, encoding, auth_info, self.services.as_ref()).await
    }

    async fn on_message(&self, session_id: &SessionID, bytes: &[u8]) -> Result<(), TransportError> {
        self.adapter.on_message(session_id, bytes, self.services.as_ref()).await
    }

    async fn on_disconnect(&self, session_id: &SessionID) {
        self.adapter.handle_disconnect(session_id, self.services.as_ref()).await;
    }

    async fn is_joined(&self, session_id: &SessionID) -> bool {
        self.adapter.is_joined(session_id).await
    }

    async fn reject_join(&self, session_id: &SessionID, request_id: &str, reason: &str) -> Result<(), TransportError> {
        self.adapter.reject_join(session_id, request_id, reason).await
    }

    async fn player_count(&self) -> usize {
        self.keeper.player_count().await
    }

    async fn session_ids(&self) -> Vec<SessionID> {
        self.adapter.session_ids().await
    }
}

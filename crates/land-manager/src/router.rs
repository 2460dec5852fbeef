use std::collections::HashMap;
use std::sync::Arc;

use land_keeper::{AuthenticatedInfo, ClientID, LandID, SessionID};
use land_protocol::{EncodingConfig, TransportMessage, WireEncoding};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::RouterError;
use crate::manager::LandManager;
use crate::type_registry::LandTypeRegistry;

/// What a session told us at `onConnect`, before it's bound to a land —
/// forwarded to the chosen adapter once the first `join` resolves which
/// land that is. See SPEC_FULL §9 "Router binding".
struct PendingConnection {
    client_id: ClientID,
    wire: WireEncoding,
    encoding: EncodingConfig,
    auth_info: Option<AuthenticatedInfo>,
}

/// Fans one transport's sessions across many lands. Holds the
/// `SessionID → LandID` binding and creates lands on demand via a
/// [`LandTypeRegistry`], forwarding each session's first `join` frame (and
/// every frame after) to the land it's bound to.
pub struct LandRouter {
    manager: Arc<LandManager>,
    registry: Arc<LandTypeRegistry>,
    bindings: RwLock<HashMap<SessionID, LandID>>,
    pending: RwLock<HashMap<SessionID, PendingConnection>>,
}

impl LandRouter {
    pub fn new(manager: Arc<LandManager>, registry: Arc<LandTypeRegistry>) -> Self {
        Self { manager, registry, bindings: RwLock::new(HashMap::new()), pending: RwLock::new(HashMap::new()) }
    }

    /// Records a newly connected session with no land bound yet.
    pub async fn on_connect(
        &self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        auth_info: Option<AuthenticatedInfo>,
    ) {
        self.pending.write().await.insert(session_id, PendingConnection { client_id, wire, encoding, auth_info });
    }

    /// Dispatches one raw frame from `session_id`. An unbound session must
    /// send a `join` first, which resolves/creates the target land and
    /// binds the session to it; every message after that is forwarded
    /// unchanged to the bound land's adapter. A `join` received on an
    /// already-bound session that names a *different* land is rejected with
    /// `reason="already-bound"` rather than rebinding.
    pub async fn on_message(&self, session_id: &SessionID, bytes: &[u8]) -> Result<(), RouterError> {
        if let Some(land_id) = self.bindings.read().await.get(session_id).cloned() {
            return self.forward_to_bound_land(session_id, &land_id, bytes).await;
        }
        self.bind_and_forward_first_join(session_id, bytes).await
    }

    async fn forward_to_bound_land(&self, session_id: &SessionID, land_id: &LandID, bytes: &[u8]) -> Result<(), RouterError> {
        let container = self.manager.get_land(land_id).await.ok_or(RouterError::UnknownSession)?;

        if let Ok(TransportMessage::Join(frame)) = land_protocol::decode(bytes) {
            let target = LandID::new(frame.land_type.clone(), frame.land_instance_id.clone());
            if target != *land_id {
                warn!(land_session = %session_id, bound_land = %land_id, requested_land = %target, "rejecting join to a second land on an already-bound session");
                container.handle.reject_join(session_id, &frame.request_id, "already-bound").await?;
                return Err(RouterError::AlreadyBound);
            }
        }

        container.handle.on_message(session_id, bytes).await.map_err(RouterError::from)
    }

    async fn bind_and_forward_first_join(&self, session_id: &SessionID, bytes: &[u8]) -> Result<(), RouterError> {
        let message = land_protocol::decode(bytes)?;
        let TransportMessage::Join(frame) = message else { return Err(RouterError::MismatchedLand) };

        let pending = self.pending.write().await.remove(session_id).ok_or(RouterError::UnknownSession)?;
        let land_id = LandID::new(frame.land_type.clone(), frame.land_instance_id.clone());

        if !self.registry.is_registered(&land_id.land_type).await {
            return Err(RouterError::UnknownLandType(land_id.land_type));
        }

        let registry = self.registry.clone();
        let land_id_for_factory = land_id.clone();
        let container = self
            .manager
            .get_or_create_land(land_id.clone(), || async move {
                registry.create(&land_id_for_factory).await.expect("land type checked as registered above")
            })
            .await;

        self.bindings.write().await.insert(session_id.clone(), land_id.clone());
        info!(land_session = %session_id, land_id = %land_id, "session bound to land");

        container
            .handle
            .on_connect(session_id.clone(), pending.client_id, pending.wire, pending.encoding, pending.auth_info)
            .await?;
        container.handle.on_message(session_id, bytes).await.map_err(RouterError::from)
    }

    /// Forwards to the bound adapter if any, then clears the binding and any
    /// still-pending connection context. A no-op for an unknown session.
    pub async fn on_disconnect(&self, session_id: &SessionID) {
        self.pending.write().await.remove(session_id);
        let Some(land_id) = self.bindings.write().await.remove(session_id) else { return };
        if let Some(container) = self.manager.get_land(&land_id).await {
            container.handle.on_disconnect(session_id).await;
        }
    }
}

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use land_keeper::{
    AuthenticatedInfo, ClientID, EffectSink, JoinError, JoinResult, LandKeeper, LandState, PlayerID, PlayerSession,
    SendTarget, SessionID,
};
use land_protocol::{
    apply_patches, codec::build_bundle, EncodingConfig, EventFrame, JoinFrame, JoinResponseFrame, PendingServerEvent,
    PongFrame, StateSnapshot, StateUpdate, StateUpdateFrame, TransportMessage, WireEncoding,
};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::error::TransportError;
use crate::registry::SubscriberRegistry;
use crate::transport::Transport;

/// `performJoin` must complete within this window of being invoked, or the
/// session is sent a `joinResponse{success:false, reason:"timeout"}` and
/// disconnected. See spec §5 "Cancellation".
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the join handshake, event dispatch, and state-sync fan-out for one
/// running land instance. Delegates authoritative mutation to a
/// [`LandKeeper`] and wire I/O to a [`Transport`]; this type's own job is
/// sequencing — `joinResponse` before `firstSync`, bundling broadcast events
/// into the opcode-107 frame when the codec allows it, never dropping an
/// event when it doesn't.
pub struct TransportAdapter<S: LandState + Clone> {
    land_type: String,
    keeper: Arc<LandKeeper<S>>,
    transport: Arc<dyn Transport>,
    registry: RwLock<SubscriberRegistry>,
    pending_broadcast: Mutex<Vec<TransportMessage>>,
    enable_legacy_join: bool,
    join_timeout: Duration,
}

impl<S: LandState + Clone + 'static> TransportAdapter<S> {
    pub fn new(keeper: Arc<LandKeeper<S>>, transport: Arc<dyn Transport>, land_type: impl Into<String>) -> Self {
        Self {
            land_type: land_type.into(),
            keeper,
            transport,
            registry: RwLock::new(SubscriberRegistry::new()),
            pending_broadcast: Mutex::new(Vec::new()),
            enable_legacy_join: false,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    /// When enabled, [`Self::on_connect`] performs an implicit guest join
    /// using the session id as the player id rather than waiting for a
    /// `join` frame — used by legacy clients that never send one.
    pub fn with_legacy_join(mut self, enable: bool) -> Self {
        self.enable_legacy_join = enable;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub async fn register_session(
        &self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
    ) {
        self.registry.write().await.register(session_id, client_id, wire, encoding);
    }

    /// Registers a newly connected session, caching `auth_info` for the join
    /// handshake to consume, then — if legacy join is enabled — performs an
    /// implicit guest join immediately using `session_id` as the player id.
    pub async fn on_connect(
        &self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        auth_info: Option<AuthenticatedInfo>,
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), TransportError> {
        self.registry.write().await.register_with_auth(session_id.clone(), client_id, wire, encoding, auth_info);
        if self.enable_legacy_join {
            let synthetic = JoinFrame {
                request_id: format!("legacy-join:{session_id}"),
                land_type: self.land_type.clone(),
                land_instance_id: None,
                player_id: Some(session_id.as_str().to_owned()),
                device_id: None,
                metadata: Default::default(),
            };
            self.handle_join(&session_id, &synthetic, services).await?;
        }
        Ok(())
    }

    pub async fn is_joined(&self, session_id: &SessionID) -> bool {
        self.registry.read().await.lookup(session_id).map(|s| s.joined).unwrap_or(false)
    }

    /// Every session currently registered against this land, joined or not —
    /// used by the manager layer to force-disconnect a land being torn down.
    pub async fn session_ids(&self) -> Vec<SessionID> {
        self.registry.read().await.all_sessions()
    }

    /// Sends a `joinResponse{success:false}` without touching the keeper —
    /// used by the router to reject a join aimed at a different land than
    /// the one a session is already bound to.
    pub async fn reject_join(&self, session_id: &SessionID, request_id: &str, reason: &str) -> Result<(), TransportError> {
        self.send_join_response(session_id, request_id, false, None, Some(reason.to_owned())).await
    }

    pub async fn handle_disconnect(&self, session_id: &SessionID, services: &(dyn Any + Send + Sync)) {
        self.keeper.leave(session_id, services).await;
        self.registry.write().await.remove(session_id);
        self.transport.disconnect(session_id).await;
    }

    /// Decodes one raw frame and dispatches it by kind: `join` runs the
    /// handshake, `event` is forwarded to the keeper, `ping` is answered
    /// with `pong` immediately. Any other kind arriving from a client is a
    /// protocol misuse and is logged, not treated as fatal.
    pub async fn on_message(
        &self,
        session_id: &SessionID,
        bytes: &[u8],
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), TransportError> {
        let message = land_protocol::decode(bytes)?;
        match message {
            TransportMessage::Join(frame) => self.handle_join(session_id, &frame, services).await,
            TransportMessage::Event(event) => self.handle_event(session_id, &event, services).await,
            TransportMessage::Ping(ping) => {
                self.send_message(session_id, &TransportMessage::Pong(PongFrame { nonce: ping.nonce })).await
            }
            TransportMessage::Pong(_) => Ok(()),
            other => {
                warn!(land_session = %session_id, kind = other.kind(), "unexpected message kind from client");
                Ok(())
            }
        }
    }

    /// Runs the join handshake: resolves the player's identity, commits the
    /// join against the keeper, sends `joinResponse`, then — strictly
    /// afterwards — sends the subscriber's `firstSync`. A session that is
    /// already joined, or whose `landType` doesn't match this adapter's own,
    /// gets a failure response rather than a second commit. The whole
    /// sequence is bounded by [`Self::join_timeout`]; a slow join is
    /// reported as a timeout failure and the session is disconnected.
    pub async fn handle_join(
        &self,
        session_id: &SessionID,
        frame: &JoinFrame,
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), TransportError> {
        if frame.land_type != self.land_type {
            return self
                .send_join_response(session_id, &frame.request_id, false, None, Some("mismatched-land".to_owned()))
                .await;
        }

        let (client_id, auth_info, already_joined) = {
            let registry = self.registry.read().await;
            let subscriber = registry.lookup(session_id).ok_or(TransportError::UnknownSession)?;
            (subscriber.client_id.clone(), subscriber.auth_info.clone(), subscriber.joined)
        };
        if already_joined {
            return self
                .send_join_response(session_id, &frame.request_id, false, None, Some("already joined".to_owned()))
                .await;
        }

        let attempt = self.perform_join(session_id, frame, client_id, auth_info.as_ref(), services);
        match tokio::time::timeout(self.join_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                warn!(land_session = %session_id, "join did not complete within the configured timeout");
                let response = self
                    .send_join_response(session_id, &frame.request_id, false, None, Some("timeout".to_owned()))
                    .await;
                self.handle_disconnect(session_id, services).await;
                response
            }
        }
    }

    async fn perform_join(
        &self,
        session_id: &SessionID,
        frame: &JoinFrame,
        client_id: ClientID,
        auth_info: Option<&AuthenticatedInfo>,
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), TransportError> {
        let player_session = PlayerSession::resolve(frame, client_id, session_id, auth_info);

        match self.keeper.join(session_id.clone(), player_session, services).await {
            Ok(JoinResult { player_id, snapshot: _ }) => {
                self.registry.write().await.set_joined(session_id, player_id.clone());
                self.send_join_response(session_id, &frame.request_id, true, Some(player_id.as_str().to_owned()), None)
                    .await?;
                self.sync_subscriber(session_id).await
            }
            Err(JoinError::AlreadyJoined) => {
                self.send_join_response(session_id, &frame.request_id, false, None, Some("already joined".to_owned())).await
            }
            Err(JoinError::Rule(rule_error)) => {
                self.send_join_response(session_id, &frame.request_id, false, None, Some(rule_error.to_string())).await
            }
        }
    }

    pub async fn handle_event(
        &self,
        session_id: &SessionID,
        event: &EventFrame,
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), TransportError> {
        let joined = {
            let registry = self.registry.read().await;
            registry.lookup(session_id).map(|s| s.joined).unwrap_or(false)
        };
        if !joined {
            return Err(TransportError::NotJoined);
        }
        self.keeper.handle_client_event(session_id, &event.event_type, event.payload.clone(), services).await?;
        Ok(())
    }

    /// Queues or sends a server-originated event depending on its target.
    /// `Broadcast` events are held until the next [`Self::sync_now`] so they
    /// can ride along with the diff frame; targeted events go out
    /// immediately.
    pub async fn send_event(&self, message: TransportMessage, target: SendTarget) -> Result<(), TransportError> {
        match target {
            SendTarget::Broadcast => {
                self.pending_broadcast.lock().await.push(message);
                Ok(())
            }
            SendTarget::Session(session_id) => self.send_message(&session_id, &message).await,
            SendTarget::Client(client_id) => {
                let session_id = { self.registry.read().await.session_for_client(&client_id) };
                match session_id {
                    Some(session_id) => self.send_message(&session_id, &message).await,
                    None => Ok(()),
                }
            }
            SendTarget::Player(player_id) => {
                let sessions = { self.registry.read().await.sessions_for_player(&player_id) };
                for session_id in sessions {
                    self.send_message(&session_id, &message).await?;
                }
                Ok(())
            }
        }
    }

    /// Sends every steady (joined, not mid-handshake) subscriber its diff,
    /// bundling this cycle's broadcast events in where the subscriber's
    /// codec allows it. Clears the broadcast queue once every subscriber has
    /// had a chance to receive it.
    pub async fn sync_now(&self) -> Result<(), TransportError> {
        let events = {
            let mut pending = self.pending_broadcast.lock().await;
            std::mem::take(&mut *pending)
        };

        let sessions = { self.registry.read().await.all_sessions() };
        for session_id in sessions {
            let target = {
                let registry = self.registry.read().await;
                registry.lookup(&session_id).and_then(|sub| {
                    (sub.joined && !sub.initial_syncing).then(|| (sub.wire, sub.encoding, sub.last_snapshot.clone()))
                })
            };
            let Some((wire, encoding, last_snapshot)) = target else { continue };

            let update = self.keeper.subscribe_state_updates(&session_id, last_snapshot.as_ref()).await;
            let new_snapshot = next_snapshot(last_snapshot, &update);
            self.registry.write().await.update_snapshot(&session_id, new_snapshot);

            self.send_update_and_events(&session_id, wire, encoding, update, events.clone()).await?;
        }
        Ok(())
    }

    async fn sync_subscriber(&self, session_id: &SessionID) -> Result<(), TransportError> {
        let (wire, encoding) = {
            let registry = self.registry.read().await;
            let subscriber = registry.lookup(session_id).ok_or(TransportError::UnknownSession)?;
            (subscriber.wire, subscriber.encoding)
        };

        let update = self.keeper.subscribe_state_updates(session_id, None).await;
        let new_snapshot = next_snapshot(None, &update);
        {
            let mut registry = self.registry.write().await;
            registry.update_snapshot(session_id, new_snapshot);
            registry.set_initial_syncing(session_id, false);
        }
        self.send_update_and_events(session_id, wire, encoding, update, Vec::new()).await
    }

    async fn send_update_and_events(
        &self,
        session_id: &SessionID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        update: StateUpdate,
        events: Vec<TransportMessage>,
    ) -> Result<(), TransportError> {
        match wire {
            WireEncoding::Object => {
                if !matches!(update, StateUpdate::NoChange) {
                    self.send_message(session_id, &TransportMessage::StateUpdate(StateUpdateFrame { update })).await?;
                }
                for event in events {
                    self.send_message(session_id, &event).await?;
                }
                Ok(())
            }
            WireEncoding::Opcode => {
                let has_update = !matches!(update, StateUpdate::NoChange);
                if !has_update && events.is_empty() {
                    return Ok(());
                }
                let pending: Vec<PendingServerEvent> =
                    events.into_iter().map(|message| PendingServerEvent { message, broadcast: true }).collect();
                let bundle = build_bundle(&update, &pending, encoding)?;
                if let Some(bytes) = bundle.bundle {
                    self.transport.send(session_id, bytes).await.map_err(TransportError::Send)?;
                }
                for standalone in bundle.standalone {
                    self.send_message(session_id, &standalone).await?;
                }
                Ok(())
            }
        }
    }

    async fn send_join_response(
        &self,
        session_id: &SessionID,
        request_id: &str,
        success: bool,
        player_slot: Option<String>,
        reason: Option<String>,
    ) -> Result<(), TransportError> {
        let message = TransportMessage::JoinResponse(JoinResponseFrame {
            request_id: request_id.to_owned(),
            success,
            land_type: None,
            land_instance_id: None,
            player_slot,
            encoding: None,
            reason,
        });
        self.send_message(session_id, &message).await
    }

    async fn send_message(&self, session_id: &SessionID, message: &TransportMessage) -> Result<(), TransportError> {
        let wire = {
            let registry = self.registry.read().await;
            registry.lookup(session_id).map(|s| s.wire).ok_or(TransportError::UnknownSession)?
        };
        let bytes = land_protocol::encode(message, wire)?;
        self.transport.send(session_id, bytes).await.map_err(TransportError::Send)
    }
}

fn next_snapshot(previous: Option<StateSnapshot>, update: &StateUpdate) -> StateSnapshot {
    match update {
        StateUpdate::FirstSync { snapshot } => snapshot.clone(),
        StateUpdate::Diff { patches } => apply_patches(&previous.unwrap_or_default(), patches),
        StateUpdate::NoChange => previous.unwrap_or_default(),
    }
}

#[async_trait]
impl<S: LandState + Clone + 'static> EffectSink for TransportAdapter<S> {
    async fn dispatch_event(&self, message: TransportMessage, target: SendTarget) {
        if let Err(error) = self.send_event(message, target).await {
            warn!(%error, "failed to dispatch a rule-queued effect");
        }
    }
}

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use land_protocol::{StateSnapshot, TransportMessage};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{EventError, JoinError};
use crate::ids::{ClientID, PlayerID, SessionID};
use crate::player_session::PlayerSession;
use crate::rules::{LandContext, RuleTable, SendTarget};
use crate::state::LandState;

/// Installed via [`LandKeeper::set_transport`]; receives effects a rule body
/// queued on its `LandContext` once the triggering dispatch has committed.
/// Implemented by the transport adapter so rule bodies never depend on it
/// directly.
#[async_trait]
pub trait EffectSink: Send + Sync {
    async fn dispatch_event(&self, message: TransportMessage, target: SendTarget);
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    pub player_id: PlayerID,
    pub snapshot: StateSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandStats {
    pub player_count: usize,
}

struct PlayerEntry {
    player_id: PlayerID,
    client_id: ClientID,
}

struct KeeperInner<S> {
    state: S,
    sessions: HashMap<SessionID, PlayerEntry>,
}

/// The authoritative actor for one land instance. All mutation goes through
/// [`Self::join`], [`Self::leave`], and [`Self::handle_client_event`], each
/// of which holds the inner mutex for the duration of one dispatch — rule
/// bodies never run concurrently with each other or with a read of
/// `current_state`.
pub struct LandKeeper<S: LandState + Clone> {
    rules: RuleTable<S>,
    inner: Mutex<KeeperInner<S>>,
    sink: RwLock<Option<Arc<dyn EffectSink>>>,
    dirty: AtomicBool,
}

impl<S: LandState + Clone> LandKeeper<S> {
    pub fn new(state: S, rules: RuleTable<S>) -> Self {
        Self {
            rules,
            inner: Mutex::new(KeeperInner { state, sessions: HashMap::new() }),
            sink: RwLock::new(None),
            dirty: AtomicBool::new(false),
        }
    }

    pub async fn set_transport(&self, sink: Arc<dyn EffectSink>) {
        *self.sink.write().await = Some(sink);
    }

    pub async fn current_state(&self) -> S {
        self.inner.lock().await.state.clone()
    }

    /// Whether any commit has happened since the last call to this method.
    /// An adapter can use this to skip recomputing diffs for every
    /// subscriber when nothing has changed since its last `syncNow`.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub async fn player_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn stats(&self) -> LandStats {
        LandStats { player_count: self.player_count().await }
    }

    /// Registers `session` under `player`'s resolved identity and runs every
    /// `onJoin` rule against a staged clone of the state. On success the
    /// clone is committed and the player's visibility-filtered snapshot is
    /// returned; on rule failure the clone is discarded and the session is
    /// not registered.
    pub async fn join(
        &self,
        session_id: SessionID,
        player: PlayerSession,
        services: &(dyn Any + Send + Sync),
    ) -> Result<JoinResult, JoinError> {
        let mut guard = self.inner.lock().await;
        if guard.sessions.contains_key(&session_id) {
            return Err(JoinError::AlreadyJoined);
        }

        let mut staged = guard.state.clone();
        let mut ctx = LandContext::new(player.player_id.clone(), player.client_id.clone(), session_id.clone(), services);
        let outcome = self.rules.run_join(&mut staged, &mut ctx);

        let effects = match outcome {
            Ok(()) => ctx.into_effects(),
            Err(err) => {
                debug!(land_session = %session_id, "onJoin rule failed, discarding staged state");
                return Err(JoinError::Rule(err));
            }
        };

        let snapshot = staged.visible_snapshot(&player.player_id);
        guard.sessions.insert(
            session_id,
            PlayerEntry { player_id: player.player_id.clone(), client_id: player.client_id },
        );
        guard.state = staged;
        drop(guard);

        self.dirty.store(true, Ordering::Release);
        self.flush_effects(effects).await;

        Ok(JoinResult { player_id: player.player_id, snapshot })
    }

    /// Removes `session_id`'s registration, if present, and runs every
    /// `onLeave` rule. `onLeave` rules cannot fail: a land always accepts a
    /// disconnect.
    pub async fn leave(&self, session_id: &SessionID, services: &(dyn Any + Send + Sync)) {
        let mut guard = self.inner.lock().await;
        let Some(entry) = guard.sessions.remove(session_id) else {
            warn!(land_session = %session_id, "leave called for a session that was never joined");
            return;
        };

        let mut staged = guard.state.clone();
        let mut ctx = LandContext::new(entry.player_id, entry.client_id, session_id.clone(), services);
        self.rules.run_leave(&mut staged, &mut ctx);
        let effects = ctx.into_effects();

        guard.state = staged;
        drop(guard);

        self.dirty.store(true, Ordering::Release);
        self.flush_effects(effects).await;
    }

    /// Dispatches one client event against every rule registered for
    /// `event_type`, in registration order, over a staged clone of the
    /// state. A rule failure rolls back the whole dispatch: none of the
    /// event's rules take effect and no effects are emitted.
    pub async fn handle_client_event(
        &self,
        session_id: &SessionID,
        event_type: &str,
        payload: Value,
        services: &(dyn Any + Send + Sync),
    ) -> Result<(), EventError> {
        if !self.rules.is_registered_event(event_type) {
            return Err(EventError::UnregisteredEvent(event_type.to_owned()));
        }

        let mut guard = self.inner.lock().await;
        let entry = guard.sessions.get(session_id).ok_or(EventError::NotJoined)?;
        let (player_id, client_id) = (entry.player_id.clone(), entry.client_id.clone());

        let mut staged = guard.state.clone();
        let mut ctx = LandContext::new(player_id, client_id, session_id.clone(), services);
        let outcome = self.rules.run_event(event_type, &mut staged, &payload, &mut ctx);

        let effects = match outcome {
            Ok(()) => ctx.into_effects(),
            Err(err) => {
                debug!(land_session = %session_id, event_type, "event rule failed, discarding staged state");
                return Err(EventError::Rule(err));
            }
        };

        guard.state = staged;
        drop(guard);

        self.dirty.store(true, Ordering::Release);
        self.flush_effects(effects).await;

        Ok(())
    }

    /// Computes the update one subscriber should receive, given the
    /// snapshot it last saw. `None` means the subscriber has never
    /// synced and must receive a `FirstSync`.
    pub async fn subscribe_state_updates(
        &self,
        session_id: &SessionID,
        last_snapshot: Option<&StateSnapshot>,
    ) -> land_protocol::StateUpdate {
        use land_protocol::StateUpdate;

        let guard = self.inner.lock().await;
        let Some(entry) = guard.sessions.get(session_id) else {
            return StateUpdate::NoChange;
        };
        let current = guard.state.visible_snapshot(&entry.player_id);
        drop(guard);

        match last_snapshot {
            None => StateUpdate::FirstSync { snapshot: current },
            Some(previous) if previous == &current => StateUpdate::NoChange,
            Some(previous) => StateUpdate::Diff { patches: land_protocol::diff(previous, &current) },
        }
    }

    async fn flush_effects(&self, effects: Vec<(TransportMessage, SendTarget)>) {
        if effects.is_empty() {
            return;
        }
        let sink = self.sink.read().await.clone();
        let Some(sink) = sink else {
            warn!("rule body queued {} effect(s) with no transport installed", effects.len());
            return;
        };
        for (message, target) in effects {
            sink.dispatch_event(message, target).await;
        }
    }
}

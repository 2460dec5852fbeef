use std::collections::{HashMap, HashSet};

use land_keeper::{AuthenticatedInfo, ClientID, PlayerID, SessionID};
use land_protocol::{EncodingConfig, StateSnapshot, WireEncoding};

/// One connected, not-necessarily-joined client. Created when a transport
/// connection is established and removed on disconnect; `player_id` is
/// `None` until the join handshake completes.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub session_id: SessionID,
    pub client_id: ClientID,
    pub player_id: Option<PlayerID>,
    pub wire: WireEncoding,
    pub encoding: EncodingConfig,
    pub joined: bool,
    /// Set the moment `joinResponse` is sent and cleared only once the
    /// subscriber's `firstSync` has gone out — guards against a diff frame
    /// (or a bundled one) racing ahead of the handshake.
    pub initial_syncing: bool,
    pub last_snapshot: Option<StateSnapshot>,
    /// Cached from `onConnect`, consumed by the join handshake, and dropped
    /// on disconnect — a reconnect under a new `SessionID` never inherits it.
    pub auth_info: Option<AuthenticatedInfo>,
}

impl Subscriber {
    fn new(session_id: SessionID, client_id: ClientID, wire: WireEncoding, encoding: EncodingConfig) -> Self {
        Self {
            session_id,
            client_id,
            player_id: None,
            wire,
            encoding,
            joined: false,
            initial_syncing: false,
            last_snapshot: None,
            auth_info: None,
        }
    }
}

/// Registers every live subscriber of one land instance, plus the reverse
/// indexes the adapter needs to resolve a [`land_keeper::SendTarget`] into
/// concrete sessions.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    by_session: HashMap<SessionID, Subscriber>,
    session_for_client: HashMap<ClientID, SessionID>,
    sessions_for_player: HashMap<PlayerID, HashSet<SessionID>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
    ) {
        self.register_with_auth(session_id, client_id, wire, encoding, None);
    }

    pub fn register_with_auth(
        &mut self,
        session_id: SessionID,
        client_id: ClientID,
        wire: WireEncoding,
        encoding: EncodingConfig,
        auth_info: Option<AuthenticatedInfo>,
    ) {
        self.session_for_client.insert(client_id.clone(), session_id.clone());
        let mut subscriber = Subscriber::new(session_id.clone(), client_id, wire, encoding);
        subscriber.auth_info = auth_info;
        self.by_session.insert(session_id, subscriber);
    }

    pub fn lookup(&self, session_id: &SessionID) -> Option<&Subscriber> {
        self.by_session.get(session_id)
    }

    pub fn lookup_mut(&mut self, session_id: &SessionID) -> Option<&mut Subscriber> {
        self.by_session.get_mut(session_id)
    }

    pub fn session_for_client(&self, client_id: &ClientID) -> Option<SessionID> {
        self.session_for_client.get(client_id).cloned()
    }

    pub fn sessions_for_player(&self, player_id: &PlayerID) -> Vec<SessionID> {
        self.sessions_for_player.get(player_id).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn all_sessions(&self) -> Vec<SessionID> {
        self.by_session.keys().cloned().collect()
    }

    /// Marks a subscriber joined under `player_id` and enters the
    /// initial-sync window. Returns `false` if `session_id` was never
    /// registered.
    pub fn set_joined(&mut self, session_id: &SessionID, player_id: PlayerID) -> bool {
        let Some(subscriber) = self.by_session.get_mut(session_id) else { return false };
        subscriber.joined = true;
        subscriber.initial_syncing = true;
        subscriber.player_id = Some(player_id.clone());
        self.sessions_for_player.entry(player_id).or_default().insert(session_id.clone());
        true
    }

    pub fn set_initial_syncing(&mut self, session_id: &SessionID, value: bool) {
        if let Some(subscriber) = self.by_session.get_mut(session_id) {
            subscriber.initial_syncing = value;
        }
    }

    pub fn update_snapshot(&mut self, session_id: &SessionID, snapshot: StateSnapshot) {
        if let Some(subscriber) = self.by_session.get_mut(session_id) {
            subscriber.last_snapshot = Some(snapshot);
        }
    }

    pub fn remove(&mut self, session_id: &SessionID) -> Option<Subscriber> {
        let subscriber = self.by_session.remove(session_id)?;
        self.session_for_client.remove(&subscriber.client_id);
        if let Some(player_id) = &subscriber.player_id {
            if let Some(set) = self.sessions_for_player.get_mut(player_id) {
                set.remove(session_id);
                if set.is_empty() {
                    self.sessions_for_player.remove(player_id);
                }
            }
        }
        Some(subscriber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_protocol::{MessageEncoding, StateUpdateEncoding};

    fn encoding() -> EncodingConfig {
        EncodingConfig::new(MessageEncoding::Json, StateUpdateEncoding::OpcodeJson)
    }

    #[test]
    fn set_joined_populates_reverse_player_index() {
        let mut registry = SubscriberRegistry::new();
        registry.register(SessionID::new("s1"), ClientID::new("c1"), WireEncoding::Object, encoding());
        registry.set_joined(&SessionID::new("s1"), PlayerID::new("p1"));

        assert_eq!(registry.sessions_for_player(&PlayerID::new("p1")), vec![SessionID::new("s1")]);
        assert!(registry.lookup(&SessionID::new("s1")).unwrap().initial_syncing);
    }

    #[test]
    fn remove_clears_every_reverse_index() {
        let mut registry = SubscriberRegistry::new();
        registry.register(SessionID::new("s1"), ClientID::new("c1"), WireEncoding::Object, encoding());
        registry.set_joined(&SessionID::new("s1"), PlayerID::new("p1"));

        registry.remove(&SessionID::new("s1"));

        assert!(registry.lookup(&SessionID::new("s1")).is_none());
        assert!(registry.session_for_client(&ClientID::new("c1")).is_none());
        assert!(registry.sessions_for_player(&PlayerID::new("p1")).is_empty());
    }
}

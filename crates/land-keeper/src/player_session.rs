use serde_json::{Map, Value};

use land_protocol::JoinFrame;

use crate::ids::{ClientID, PlayerID, SessionID};

/// Opaque identity handed in by an external auth collaborator (never
/// constructed by `land-keeper` itself). Absence means the session is
/// unauthenticated and falls back to a guest identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthenticatedInfo {
    pub player_id: Option<PlayerID>,
    pub device_id: Option<String>,
    pub metadata: Map<String, Value>,
}

/// The resolved identity and metadata a session joins a land as. Built once
/// at join time by merging, in priority order: the `join` frame's own
/// fields, then `AuthenticatedInfo`, then a guest identity derived from the
/// `SessionID`. Metadata is a union merge across all three sources, with
/// higher-priority sources winning key conflicts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    pub player_id: PlayerID,
    pub client_id: ClientID,
    pub device_id: Option<String>,
    pub metadata: Map<String, Value>,
}

impl PlayerSession {
    pub fn resolve(
        join: &JoinFrame,
        client_id: ClientID,
        session_id: &SessionID,
        authenticated: Option<&AuthenticatedInfo>,
    ) -> Self {
        let player_id = join
            .player_id
            .clone()
            .map(PlayerID::from)
            .or_else(|| authenticated.and_then(|info| info.player_id.clone()))
            .unwrap_or_else(|| PlayerID::new(format!("guest:{session_id}")));

        let device_id = join
            .device_id
            .clone()
            .or_else(|| authenticated.and_then(|info| info.device_id.clone()));

        let mut metadata = Map::new();
        if let Some(info) = authenticated {
            for (key, value) in &info.metadata {
                metadata.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &join.metadata {
            metadata.insert(key.clone(), value.clone());
        }

        Self { player_id, client_id, device_id, metadata }
    }
}

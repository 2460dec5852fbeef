use land_protocol::StateSnapshot;
use serde_json::Value;

use crate::ids::PlayerID;

/// Who a single state field is visible to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Sent to every subscriber.
    Broadcast,
    /// Sent only to the subscriber whose `PlayerID` matches.
    Private(PlayerID),
}

/// One addressable leaf of a land's state, as produced by [`LandState::fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub path: String,
    pub value: Value,
    pub policy: SyncPolicy,
}

impl FieldEntry {
    pub fn broadcast(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), value, policy: SyncPolicy::Broadcast }
    }

    pub fn private(path: impl Into<String>, value: Value, owner: PlayerID) -> Self {
        Self { path: path.into(), value, policy: SyncPolicy::Private(owner) }
    }
}

/// A land's typed authoritative state. Rule bodies mutate `Self` directly;
/// `fields` is consulted only when a subscriber's view needs recomputing, so
/// it may be as expensive as the schema requires without slowing rule
/// dispatch.
pub trait LandState: Send + 'static {
    fn fields(&self) -> Vec<FieldEntry>;

    /// The full snapshot, ignoring visibility. Used for broadcast-only lands
    /// and for tests that don't care about per-player filtering.
    fn snapshot(&self) -> StateSnapshot {
        self.fields().into_iter().map(|f| (f.path, f.value)).collect()
    }

    /// The snapshot visible to one player: every `Broadcast` field, plus any
    /// `Private` field owned by `viewer`.
    fn visible_snapshot(&self, viewer: &PlayerID) -> StateSnapshot {
        self.fields()
            .into_iter()
            .filter(|field| match &field.policy {
                SyncPolicy::Broadcast => true,
                SyncPolicy::Private(owner) => owner == viewer,
            })
            .map(|f| (f.path, f.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Scoreboard {
        count: i64,
        hand: Vec<String>,
    }

    impl LandState for Scoreboard {
        fn fields(&self) -> Vec<FieldEntry> {
            vec![
                FieldEntry::broadcast("/count", json!(self.count)),
                FieldEntry::private("/hand", json!(self.hand), PlayerID::new("alice")),
            ]
        }
    }

    #[test]
    fn visible_snapshot_includes_broadcast_fields_for_any_viewer() {
        let state = Scoreboard { count: 3, hand: vec!["K".to_owned()] };
        let snapshot = state.visible_snapshot(&PlayerID::new("bob"));
        assert_eq!(snapshot.get("/count"), Some(&json!(3)));
        assert!(!snapshot.contains_key("/hand"));
    }

    #[test]
    fn visible_snapshot_includes_private_fields_only_for_owner() {
        let state = Scoreboard { count: 3, hand: vec!["K".to_owned()] };
        let snapshot = state.visible_snapshot(&PlayerID::new("alice"));
        assert_eq!(snapshot.get("/hand"), Some(&json!(["K"])));
    }
}

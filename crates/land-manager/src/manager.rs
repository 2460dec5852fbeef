use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use land_keeper::LandID;
use tokio::sync::RwLock;
use tracing::info;

use crate::handle::LandHandle;

/// One running land's container, as exposed by [`LandManager`]:
/// [`spec §4.E`]'s `LandContainer{landID, keeper, transport-ref, adapter,
/// createdAt}`, with `keeper`/`transport`/`adapter` folded into the
/// type-erased `handle`.
pub struct LandContainer {
    pub land_id: LandID,
    pub handle: Arc<dyn LandHandle>,
    pub created_at: Instant,
}

/// The manager-level view named in spec §3: `{landID, playerCount,
/// createdAt}`. Distinct from [`land_keeper::LandStats`], which a keeper
/// reports about itself with no notion of `landID` or creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandStats {
    pub land_id: LandID,
    pub player_count: usize,
    pub created_at: Instant,
}

/// Owns every running land instance, keyed by [`LandID`]. Lookup, creation,
/// and removal are all serialized against a single `RwLock`, mirroring this
/// codebase's `AppState::broadcast_registry` pattern.
#[derive(Default)]
pub struct LandManager {
    lands: RwLock<HashMap<LandID, Arc<LandContainer>>>,
}

impl LandManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing container for `land_id`, or builds one with
    /// `factory` and inserts it. Idempotent: two calls for the same
    /// `land_id` return containers with the same identity, even when they
    /// race — the loser's freshly built handle is simply dropped.
    pub async fn get_or_create_land<F, Fut>(&self, land_id: LandID, factory: F) -> Arc<LandContainer>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Arc<dyn LandHandle>>,
    {
        if let Some(container) = self.lands.read().await.get(&land_id).cloned() {
            return container;
        }

        let handle = factory().await;
        let mut lands = self.lands.write().await;
        if let Some(container) = lands.get(&land_id).cloned() {
            return container;
        }
        let container = Arc::new(LandContainer { land_id: land_id.clone(), handle, created_at: Instant::now() });
        info!(land_id = %land_id, "land created");
        lands.insert(land_id, container.clone());
        container
    }

    pub async fn get_land(&self, land_id: &LandID) -> Option<Arc<LandContainer>> {
        self.lands.read().await.get(land_id).cloned()
    }

    pub async fn list_lands(&self) -> Vec<LandID> {
        self.lands.read().await.keys().cloned().collect()
    }

    /// Tears down the land: force-disconnects every currently registered
    /// session (the spec's documented choice over draining them, see
    /// SPEC_FULL §9) and removes the container from the map. A no-op if
    /// `land_id` is unknown.
    pub async fn remove_land(&self, land_id: &LandID) -> bool {
        let container = { self.lands.write().await.remove(land_id) };
        let Some(container) = container else { return false };
        for session_id in container.handle.session_ids().await {
            container.handle.on_disconnect(&session_id).await;
        }
        info!(land_id = %land_id, "land removed");
        true
    }

    pub async fn get_land_stats(&self, land_id: &LandID) -> Option<LandStats> {
        let container = self.get_land(land_id).await?;
        Some(LandStats {
            land_id: container.land_id.clone(),
            player_count: container.handle.player_count().await,
            created_at: container.created_at,
        })
    }
}

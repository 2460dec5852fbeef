use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use land_keeper::LandID;
use tokio::sync::RwLock;

use crate::handle::LandHandle;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Builds a fresh [`LandHandle`] for one land type. Boxed-future rather
/// than a plain closure because wiring a keeper to its adapter
/// (`LandRuntime::new`) is itself async.
type Factory = Arc<dyn Fn(LandID) -> BoxFuture<'static, Arc<dyn LandHandle>> + Send + Sync>;

/// Maps `landType` names to the factory that creates a new land instance of
/// that type — the router's source of `LandHandle`s when
/// [`crate::manager::LandManager::get_or_create_land`] misses.
#[derive(Default)]
pub struct LandTypeRegistry {
    factories: RwLock<HashMap<String, Factory>>,
}

impl LandTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for `land_type`. A second registration for the
    /// same name replaces the first.
    pub async fn register<F, Fut>(&self, land_type: impl Into<String>, factory: F)
    where
        F: Fn(LandID) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Arc<dyn LandHandle>> + Send + 'static,
    {
        let boxed: Factory =
            Arc::new(move |land_id| -> BoxFuture<'static, Arc<dyn LandHandle>> { Box::pin(factory(land_id)) });
        self.factories.write().await.insert(land_type.into(), boxed);
    }

    /// Creates a new land instance for `land_id` using the factory
    /// registered under `land_id.land_type`, or `None` if no such land type
    /// is registered.
    pub async fn create(&self, land_id: &LandID) -> Option<Arc<dyn LandHandle>> {
        let factory = self.factories.read().await.get(&land_id.land_type).cloned()?;
        Some(factory(land_id.clone()).await)
    }

    pub async fn is_registered(&self, land_type: &str) -> bool {
        self.factories.read().await.contains_key(land_type)
    }
}

//! Multi-land lifecycle and dispatch: a process-wide [`LandManager`] holds
//! every running land behind a type-erased [`LandHandle`], and a
//! [`LandRouter`] binds each connected session to the right one from its
//! first `join` frame.

pub mod error;
pub mod handle;
pub mod manager;
pub mod router;
pub mod type_registry;

pub use error::RouterError;
pub use handle::{LandHandle, LandRuntime};
pub use manager::{LandContainer, LandManager, LandStats};
pub use router::LandRouter;
pub use type_registry::LandTypeRegistry;

//! Subscriber bookkeeping and the per-land transport adapter: the join
//! handshake, event intake, and the diff/bundle fan-out that turns a
//! [`land_keeper::LandKeeper`]'s state into wire frames.

pub mod adapter;
pub mod error;
pub mod registry;
pub mod transport;

pub use adapter::{TransportAdapter, DEFAULT_JOIN_TIMEOUT};
pub use error::TransportError;
pub use registry::{Subscriber, SubscriberRegistry};
pub use transport::Transport;

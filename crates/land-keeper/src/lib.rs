//! The authoritative per-land actor: identity resolution, rule dispatch
//! over a staged state clone, and visibility-filtered diff computation.
//!
//! A land type is defined by a [`state::LandState`] implementation plus a
//! [`rules::RuleTable`] compiled against it; [`keeper::LandKeeper`] owns one
//! running instance of that pair and serializes every mutation through a
//! single `tokio::sync::Mutex`.

pub mod error;
pub mod ids;
pub mod keeper;
pub mod player_session;
pub mod rules;
pub mod state;

pub use error::{EventError, JoinError};
pub use ids::{ClientID, LandID, PlayerID, SessionID};
pub use keeper::{EffectSink, JoinResult, LandKeeper, LandStats};
pub use player_session::{AuthenticatedInfo, PlayerSession};
pub use rules::{LandContext, RuleError, RuleTable, SendTarget};
pub use state::{FieldEntry, LandState, SyncPolicy};

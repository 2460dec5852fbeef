use std::any::Any;
use std::collections::HashMap;

use land_protocol::TransportMessage;
use thiserror::Error;

use crate::ids::{ClientID, PlayerID, SessionID};

/// Who an outbound server event queued from a rule body should reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    Broadcast,
    Session(SessionID),
    Client(ClientID),
    Player(PlayerID),
}

/// A rule body's own failure. Carries no structure beyond a message: rule
/// authors decide what detail is worth surfacing to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rule failed: {0}")]
pub struct RuleError(pub String);

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Identity and collaborators available to a rule body while it runs.
/// Outbound events raised via [`LandContext::send_event`] are collected, not
/// sent, until the whole dispatch commits.
pub struct LandContext<'a> {
    pub player_id: PlayerID,
    pub client_id: ClientID,
    pub session_id: SessionID,
    pub services: &'a (dyn Any + Send + Sync),
    effects: Vec<(TransportMessage, SendTarget)>,
}

impl<'a> LandContext<'a> {
    pub fn new(
        player_id: PlayerID,
        client_id: ClientID,
        session_id: SessionID,
        services: &'a (dyn Any + Send + Sync),
    ) -> Self {
        Self { player_id, client_id, session_id, services, effects: Vec::new() }
    }

    pub fn send_event(&mut self, message: TransportMessage, target: SendTarget) {
        self.effects.push((message, target));
    }

    pub fn services_as<T: 'static>(&self) -> Option<&T> {
        self.services.downcast_ref::<T>()
    }

    pub fn into_effects(self) -> Vec<(TransportMessage, SendTarget)> {
        self.effects
    }
}

type JoinRule<S> = Box<dyn Fn(&mut S, &mut LandContext) -> Result<(), RuleError> + Send + Sync>;
type LeaveRule<S> = Box<dyn Fn(&mut S, &mut LandContext) + Send + Sync>;
type ClientEventRule<S> =
    Box<dyn Fn(&mut S, &serde_json::Value, &mut LandContext) -> Result<(), RuleError> + Send + Sync>;

/// A compiled, immutable table of rule bodies for one land type. Built once
/// at land-type registration time via the builder methods and never mutated
/// afterwards; the keeper only ever reads it.
pub struct RuleTable<S> {
    on_join: Vec<JoinRule<S>>,
    on_leave: Vec<LeaveRule<S>>,
    on_event: HashMap<String, Vec<ClientEventRule<S>>>,
}

impl<S> Default for RuleTable<S> {
    fn default() -> Self {
        Self { on_join: Vec::new(), on_leave: Vec::new(), on_event: HashMap::new() }
    }
}

impl<S> RuleTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_join(mut self, rule: impl Fn(&mut S, &mut LandContext) -> Result<(), RuleError> + Send + Sync + 'static) -> Self {
        self.on_join.push(Box::new(rule));
        self
    }

    pub fn on_leave(mut self, rule: impl Fn(&mut S, &mut LandContext) + Send + Sync + 'static) -> Self {
        self.on_leave.push(Box::new(rule));
        self
    }

    pub fn on_event(
        mut self,
        event_type: impl Into<String>,
        rule: impl Fn(&mut S, &serde_json::Value, &mut LandContext) -> Result<(), RuleError> + Send + Sync + 'static,
    ) -> Self {
        self.on_event.entry(event_type.into()).or_default().push(Box::new(rule));
        self
    }

    pub fn is_registered_event(&self, event_type: &str) -> bool {
        self.on_event.contains_key(event_type)
    }

    pub(crate) fn run_join(&self, state: &mut S, ctx: &mut LandContext) -> Result<(), RuleError> {
        for rule in &self.on_join {
            rule(state, ctx)?;
        }
        Ok(())
    }

    pub(crate) fn run_leave(&self, state: &mut S, ctx: &mut LandContext) {
        for rule in &self.on_leave {
            rule(state, ctx);
        }
    }

    pub(crate) fn run_event(
        &self,
        event_type: &str,
        state: &mut S,
        payload: &serde_json::Value,
        ctx: &mut LandContext,
    ) -> Result<(), RuleError> {
        if let Some(rules) = self.on_event.get(event_type) {
            for rule in rules {
                rule(state, payload, ctx)?;
            }
        }
        Ok(())
    }
}

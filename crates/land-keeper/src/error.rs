use thiserror::Error;

use crate::rules::RuleError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("session is already joined")]
    AlreadyJoined,
    #[error("onJoin rule failed: {0}")]
    Rule(#[from] RuleError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("session has not joined this land")]
    NotJoined,
    #[error("event type {0:?} has no registered rule")]
    UnregisteredEvent(String),
    #[error("event rule failed: {0}")]
    Rule(#[from] RuleError),
}

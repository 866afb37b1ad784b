//! Error types for the Router actor.

use super::RuleId;
use actor_runtime::ActorError;
use thiserror::Error;

/// Errors that can occur during routing operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterError {
    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("Rule name must not be empty")]
    EmptyRuleName,

    /// One attempt to hand an event to a target failed.
    #[error("Delivery to target {target} failed: {reason}")]
    DeliveryFailed { target: String, reason: String },

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<ActorError> for RouterError {
    fn from(e: ActorError) -> Self {
        RouterError::ActorCommunicationError(e.to_string())
    }
}

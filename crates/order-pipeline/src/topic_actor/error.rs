//! Error types for the Topic actor.

use crate::model::SubscriptionId;
use actor_runtime::ActorError;
use thiserror::Error;

/// Errors that can occur during topic operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopicError {
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    /// The confirmation token is unknown or was already used.
    #[error("Invalid confirmation token")]
    InvalidToken,

    #[error("Event could not be turned into a notification: {0}")]
    InvalidEvent(String),

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<ActorError> for TopicError {
    fn from(e: ActorError) -> Self {
        TopicError::ActorCommunicationError(e.to_string())
    }
}

/// A single endpoint refused or failed a delivery.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Delivery to {endpoint} failed: {reason}")]
pub struct EndpointError {
    pub endpoint: String,
    pub reason: String,
}

impl EndpointError {
    pub fn new(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

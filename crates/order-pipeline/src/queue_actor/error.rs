//! Error types for the Queue actor.

use crate::model::MessageId;
use actor_runtime::ActorError;
use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    /// No message with this id is stored in the queue.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// The message exists but nobody holds a lease on it.
    #[error("Message not in flight: {0}")]
    MessageNotInFlight(MessageId),

    /// The lease this handle was issued for has lapsed; someone else may hold the message now.
    #[error("Stale receipt handle for message {0}")]
    StaleLease(MessageId),

    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Batch size must be between 1 and {max}, got {requested}")]
    InvalidBatchSize { requested: usize, max: usize },

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

impl From<ActorError> for QueueError {
    fn from(e: ActorError) -> Self {
        QueueError::ActorCommunicationError(e.to_string())
    }
}

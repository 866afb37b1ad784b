//! Error types for the Order processor.

use super::HandlerError;
use crate::queue_actor::QueueError;
use crate::router_actor::RouterError;
use thiserror::Error;

/// Why a single message failed. Every variant leaves the message un-acknowledged.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProcessorError {
    /// The body is not a well-formed order document.
    #[error("Malformed order: {0}")]
    Decode(String),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The event could not be handed to the router.
    #[error("Failed to emit event: {0}")]
    Emit(#[from] RouterError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

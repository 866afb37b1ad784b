//! Error types for provisioning and running the pipeline.

use crate::queue_actor::QueueError;
use crate::router_actor::RouterError;
use crate::topic_actor::TopicError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{component} not ready after {attempts} attempts")]
    NotReady { component: String, attempts: u32 },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error("Pipeline did not settle within {0:?}")]
    SettleTimeout(Duration),

    /// An actor or worker task panicked or was cancelled.
    #[error("Task {name} failed: {reason}")]
    TaskFailed { name: String, reason: String },
}

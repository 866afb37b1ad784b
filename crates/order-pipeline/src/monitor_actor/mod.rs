//! # Monitor Actor
//!
//! Samples the number of messages held by the dead-letter queue, visible or in flight, every
//! `period` and runs it through an [`AlarmEvaluator`]. The current [`AlarmState`] is published
//! on a `watch` channel, and each transition is logged and optionally announced on a topic.

pub mod alarm;
pub mod entity;

pub use alarm::*;
pub use entity::*;

use crate::clients::MonitorClient;
use crate::config::MonitorConfig;
use crate::queue_actor::QueueError;
use actor_runtime::{Actor, Response};
use tokio::sync::watch;

#[derive(Debug)]
pub enum MonitorRequest {
    Status {
        respond_to: Response<MonitorStatus>,
    },
    /// Takes a sample outside the regular schedule.
    SampleNow {
        respond_to: Response<Result<MonitorStatus, QueueError>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    pub alarm_name: String,
    pub state: AlarmState,
    pub last_depth: Option<usize>,
    pub samples: u64,
}

/// Creates a new Monitor actor and its client.
pub fn new(config: MonitorConfig) -> (Actor<MonitorState>, MonitorClient) {
    let (state_tx, state_rx) = watch::channel(AlarmState::Ok);
    let (actor, mailbox) = Actor::new(MonitorState::new(config, state_tx), 8);
    (actor, MonitorClient::new(mailbox, state_rx))
}

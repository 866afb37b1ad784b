//! # Monitor Client
//!
//! Provides a high-level API for interacting with the Monitor actor.
use crate::monitor_actor::{AlarmState, MonitorRequest, MonitorStatus};
use crate::queue_actor::QueueError;
use actor_runtime::{ActorClient, ActorError, Mailbox};
use async_trait::async_trait;
use tokio::sync::watch;

/// Client for interacting with the Monitor actor.
#[derive(Clone, Debug)]
pub struct MonitorClient {
    mailbox: Mailbox<MonitorRequest>,
    state: watch::Receiver<AlarmState>,
}

#[async_trait]
impl ActorClient for MonitorClient {
    type Request = MonitorRequest;
    type Error = QueueError;

    fn mailbox(&self) -> &Mailbox<MonitorRequest> {
        &self.mailbox
    }

    fn map_error(e: ActorError) -> Self::Error {
        QueueError::from(e)
    }
}

impl MonitorClient {
    pub fn new(mailbox: Mailbox<MonitorRequest>, state: watch::Receiver<AlarmState>) -> Self {
        Self { mailbox, state }
    }

    /// Latest alarm state, without a round trip to the actor.
    pub fn state(&self) -> AlarmState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<AlarmState> {
        self.state.clone()
    }

    pub async fn status(&self) -> Result<MonitorStatus, QueueError> {
        self.request(|respond_to| MonitorRequest::Status { respond_to })
            .await
    }

    pub async fn sample_now(&self) -> Result<MonitorStatus, QueueError> {
        self.request(|respond_to| MonitorRequest::SampleNow { respond_to })
            .await?
    }
}

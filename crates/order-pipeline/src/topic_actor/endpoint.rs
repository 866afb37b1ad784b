//! Delivery endpoints for topic subscriptions.
//!
//! The topic never knows how a notification travels; it calls [`Endpoint::deliver`] and counts
//! the outcome. Transports such as SMTP or webhooks plug in here. The built-ins cover what the
//! pipeline needs in-process:
//!
//! - [`QueueEndpoint`] - serializes the notification as JSON into a queue
//! - [`ChannelEndpoint`] - forwards the notification on an mpsc channel
//! - [`LoggingEndpoint`] - logs the notification, standing in for email and http

use super::EndpointError;
use crate::clients::QueueClient;
use crate::model::{Notification, Protocol};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio::sync::mpsc;
use tracing::info;

#[async_trait]
pub trait Endpoint: Send + Sync + Debug + 'static {
    fn protocol(&self) -> Protocol;

    /// Address shown in subscription listings.
    fn address(&self) -> String;

    async fn deliver(&self, notification: &Notification) -> Result<(), EndpointError>;
}

#[derive(Debug, Clone)]
pub struct QueueEndpoint {
    queue: QueueClient,
}

impl QueueEndpoint {
    pub fn new(queue: QueueClient) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Endpoint for QueueEndpoint {
    fn protocol(&self) -> Protocol {
        Protocol::Queue
    }

    fn address(&self) -> String {
        self.queue.name().to_string()
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), EndpointError> {
        let body = serde_json::to_string(notification)
            .map_err(|e| EndpointError::new(self.address(), e.to_string()))?;
        self.queue
            .send(body)
            .await
            .map(|_| ())
            .map_err(|e| EndpointError::new(self.address(), e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEndpoint {
    name: String,
    sender: mpsc::Sender<Notification>,
}

impl ChannelEndpoint {
    /// Creates the endpoint and the receiver an in-process consumer reads from.
    pub fn new(name: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (
            Self {
                name: name.into(),
                sender,
            },
            receiver,
        )
    }
}

#[async_trait]
impl Endpoint for ChannelEndpoint {
    fn protocol(&self) -> Protocol {
        Protocol::Channel
    }

    fn address(&self) -> String {
        self.name.clone()
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), EndpointError> {
        self.sender
            .send(notification.clone())
            .await
            .map_err(|_| EndpointError::new(&self.name, "receiver closed"))
    }
}

/// Logs every notification. Used for email and http subscriptions.
#[derive(Debug, Clone)]
pub struct LoggingEndpoint {
    protocol: Protocol,
    address: String,
}

impl LoggingEndpoint {
    pub fn email(address: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Email,
            address: address.into(),
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Http,
            address: url.into(),
        }
    }
}

#[async_trait]
impl Endpoint for LoggingEndpoint {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), EndpointError> {
        info!(
            protocol = %self.protocol,
            to = %self.address,
            subject = %notification.subject,
            kind = ?notification.kind,
            "Notification delivered"
        );
        Ok(())
    }
}

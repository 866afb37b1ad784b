//! # Topic Client
//!
//! Provides a high-level API for interacting with the Topic actor.
use crate::model::{
    DomainEvent, FilterPolicy, Notification, Subscription, SubscriptionId, SubscriptionStatus,
};
use crate::topic_actor::{Endpoint, PublishReceipt, TopicError, TopicRequest};
use actor_runtime::{ActorClient, ActorError, Mailbox};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Client for interacting with the Topic actor.
#[derive(Clone, Debug)]
pub struct TopicClient {
    name: Arc<str>,
    mailbox: Mailbox<TopicRequest>,
}

#[async_trait]
impl ActorClient for TopicClient {
    type Request = TopicRequest;
    type Error = TopicError;

    fn mailbox(&self) -> &Mailbox<TopicRequest> {
        &self.mailbox
    }

    fn map_error(e: ActorError) -> Self::Error {
        TopicError::from(e)
    }
}

impl TopicClient {
    pub fn new(name: &str, mailbox: Mailbox<TopicRequest>) -> Self {
        Self {
            name: name.into(),
            mailbox,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, endpoint), fields(topic = %self.name, endpoint = %endpoint.address()))]
    pub async fn subscribe(
        &self,
        endpoint: Arc<dyn Endpoint>,
        filter_policy: Option<FilterPolicy>,
    ) -> Result<(SubscriptionId, SubscriptionStatus), TopicError> {
        self.request(|respond_to| TopicRequest::Subscribe {
            endpoint,
            filter_policy,
            respond_to,
        })
        .await
    }

    #[instrument(skip(self, token), fields(topic = %self.name))]
    pub async fn confirm_subscription(&self, token: &str) -> Result<SubscriptionId, TopicError> {
        let token = token.to_string();
        self.request(|respond_to| TopicRequest::ConfirmSubscription { token, respond_to })
            .await?
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TopicError> {
        self.request(move |respond_to| TopicRequest::Unsubscribe { id, respond_to })
            .await?
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, TopicError> {
        self.request(|respond_to| TopicRequest::ListSubscriptions { respond_to })
            .await
    }

    /// Publishes a prepared notification. Returns once deliveries have been started.
    #[instrument(skip(self, notification), fields(topic = %self.name, subject = %notification.subject))]
    pub async fn publish(&self, notification: Notification) -> Result<PublishReceipt, TopicError> {
        self.request(|respond_to| TopicRequest::Publish {
            notification,
            respond_to,
        })
        .await
    }

    /// Renders a domain event as a notification and publishes it.
    pub async fn publish_event(&self, event: &DomainEvent) -> Result<PublishReceipt, TopicError> {
        self.publish(Notification::for_event(&self.name, event))
            .await
    }

    /// Waits until every delivery started so far has finished.
    pub async fn flush(&self) -> Result<(), TopicError> {
        self.request(|respond_to| TopicRequest::Flush { respond_to })
            .await
    }
}

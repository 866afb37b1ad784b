//! Requests understood by the Topic actor.

use super::{Endpoint, TopicError};
use crate::model::{FilterPolicy, Notification, Subscription, SubscriptionId, SubscriptionStatus};
use actor_runtime::Response;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug)]
pub enum TopicRequest {
    Subscribe {
        endpoint: Arc<dyn Endpoint>,
        filter_policy: Option<FilterPolicy>,
        respond_to: Response<(SubscriptionId, SubscriptionStatus)>,
    },
    ConfirmSubscription {
        token: String,
        respond_to: Response<Result<SubscriptionId, TopicError>>,
    },
    Unsubscribe {
        id: SubscriptionId,
        respond_to: Response<Result<(), TopicError>>,
    },
    ListSubscriptions {
        respond_to: Response<Vec<Subscription>>,
    },
    /// Fans a notification out to every confirmed, matching subscription.
    Publish {
        notification: Notification,
        respond_to: Response<PublishReceipt>,
    },
    /// Waits for every delivery started so far to finish.
    Flush { respond_to: Response<()> },
}

/// Outcome of a publish, known before any delivery completes.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub message_id: Uuid,
    /// Confirmed subscriptions whose filter matched.
    pub dispatched: usize,
    /// Subscriptions still waiting for confirmation.
    pub withheld: usize,
    /// Confirmed subscriptions whose filter policy rejected the notification.
    pub filtered: usize,
}

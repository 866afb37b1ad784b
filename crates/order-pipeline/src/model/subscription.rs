//! Topic subscription and notification types.

use super::DomainEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use uuid::Uuid;

/// Type-safe identifier for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub_{}", self.0.simple())
    }
}

/// Delivery protocol of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Email,
    Http,
    Queue,
    Channel,
}

impl Protocol {
    /// Human-reachable endpoints must confirm before they receive live traffic.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Protocol::Email | Protocol::Http)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Protocol::Email => "email",
            Protocol::Http => "http",
            Protocol::Queue => "queue",
            Protocol::Channel => "channel",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    PendingConfirmation,
    Confirmed,
}

/// Attribute name → allowed values. A notification matches when every named attribute is
/// present with one of the allowed values.
pub type FilterPolicy = BTreeMap<String, Vec<String>>;

/// Snapshot of a subscription as reported by the topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: String,
    pub protocol: Protocol,
    /// Address of the endpoint (email address, URL, queue name, ...).
    pub endpoint: String,
    pub confirmed: bool,
    pub filter_policy: Option<FilterPolicy>,
    pub delivered: u64,
    pub failed: u64,
}

impl Subscription {
    pub fn status(&self) -> SubscriptionStatus {
        if self.confirmed {
            SubscriptionStatus::Confirmed
        } else {
            SubscriptionStatus::PendingConfirmation
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Handshake sent to a pending subscription. The recipient confirms with `token`.
    SubscriptionConfirmation { token: String },
    Notification,
}

/// What a topic hands to an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message_id: Uuid,
    pub topic: String,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(
        topic: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            topic: topic.into(),
            kind: NotificationKind::Notification,
            subject: subject.into(),
            body: body.into(),
            attributes,
        }
    }

    /// The handshake a pending subscription receives.
    pub fn confirmation(topic: &str, token: String) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            topic: topic.to_string(),
            subject: format!("Confirm your subscription to {topic}"),
            body: format!("Confirm with token {token}"),
            kind: NotificationKind::SubscriptionConfirmation { token },
            attributes: BTreeMap::new(),
        }
    }

    /// Renders a domain event for human and machine subscribers alike.
    ///
    /// Order events get the subject `Order <orderId> - <STATUS>`, a pretty-printed summary
    /// body and the `eventType`, `orderId` and `status` attributes filter policies match on.
    /// Anything else is published with its detail type as subject and its detail as body.
    pub fn for_event(topic: &str, event: &DomainEvent) -> Self {
        let mut attributes =
            BTreeMap::from([("eventType".to_string(), event.detail_type.clone())]);
        let status = event
            .detail_str("status")
            .unwrap_or(&event.detail_type)
            .to_string();

        let (subject, body) = match event.detail_str("orderId") {
            Some(order_id) => {
                attributes.insert("orderId".to_string(), order_id.to_string());
                attributes.insert("status".to_string(), status.clone());
                let summary: Map<String, Value> =
                    ["orderId", "status", "customerId", "total", "timestamp"]
                        .into_iter()
                        .filter_map(|field| {
                            event.detail.get(field).map(|v| (field.to_string(), v.clone()))
                        })
                        .collect();
                (
                    format!("Order {order_id} - {}", status.to_uppercase()),
                    Value::Object(summary),
                )
            }
            None => (event.detail_type.clone(), event.detail.clone()),
        };

        // Serializing an in-memory Value cannot fail
        let body = serde_json::to_string_pretty(&body).unwrap_or_default();
        Self::new(topic, subject, body, attributes)
    }

    pub fn matches(&self, policy: &FilterPolicy) -> bool {
        policy.iter().all(|(name, allowed)| {
            self.attributes
                .get(name)
                .is_some_and(|value| allowed.iter().any(|a| a == value))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(status: &str) -> Notification {
        Notification {
            message_id: Uuid::new_v4(),
            topic: "OrderEvents".into(),
            kind: NotificationKind::Notification,
            subject: "Order ORD-1 - PROCESSED".into(),
            body: "{}".into(),
            attributes: BTreeMap::from([
                ("eventType".to_string(), "ORDER_PROCESSED".to_string()),
                ("status".to_string(), status.to_string()),
            ]),
        }
    }

    #[test]
    fn test_filter_policy_matching() {
        let policy = FilterPolicy::from([(
            "status".to_string(),
            vec!["shipped".to_string(), "processed".to_string()],
        )]);
        assert!(notification("processed").matches(&policy));
        assert!(!notification("cancelled").matches(&policy));

        let missing = FilterPolicy::from([("region".to_string(), vec!["eu".to_string()])]);
        assert!(!notification("processed").matches(&missing));
        assert!(notification("processed").matches(&FilterPolicy::new()));
    }

    #[test]
    fn test_order_event_rendering() {
        let event = DomainEvent::new(
            "order.service",
            "ORDER_PROCESSED",
            serde_json::json!({
                "orderId": "ORD-7",
                "customerId": "CUST-1",
                "status": "processed",
                "total": 10.5,
                "items": [],
            }),
        );
        let n = Notification::for_event("OrderEvents", &event);
        assert_eq!(n.subject, "Order ORD-7 - PROCESSED");
        assert_eq!(n.topic, "OrderEvents");
        assert_eq!(n.attributes["eventType"], "ORDER_PROCESSED");
        assert_eq!(n.attributes["orderId"], "ORD-7");
        assert_eq!(n.attributes["status"], "processed");

        let body: Value = serde_json::from_str(&n.body).unwrap();
        assert_eq!(body["customerId"], "CUST-1");
        assert!(body.get("items").is_none());
    }

    #[test]
    fn test_confirmation_protocols() {
        assert!(Protocol::Email.requires_confirmation());
        assert!(Protocol::Http.requires_confirmation());
        assert!(!Protocol::Queue.requires_confirmation());
        assert!(!Protocol::Channel.requires_confirmation());
    }
}

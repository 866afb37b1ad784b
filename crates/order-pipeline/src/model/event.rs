use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use uuid::Uuid;

/// Logical emitter identity of the order processor.
pub const ORDER_SERVICE_SOURCE: &str = "order.service";

/// Detail type of the event emitted once per successfully processed order.
pub const ORDER_PROCESSED: &str = "ORDER_PROCESSED";

/// Type-safe identifier for domain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt_{}", self.0.simple())
    }
}

/// An immutable fact emitted by a component and routed by the event router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_id: EventId,
    pub source: String,
    pub detail_type: String,
    pub detail: Value,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(source: impl Into<String>, detail_type: impl Into<String>, detail: Value) -> Self {
        Self {
            event_id: EventId::new(),
            source: source.into(),
            detail_type: detail_type.into(),
            detail,
            timestamp: Utc::now(),
        }
    }

    /// Reads a string field out of the detail object, if present.
    pub fn detail_str(&self, field: &str) -> Option<&str> {
        self.detail.get(field).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_with_camel_case_fields() {
        let event = DomainEvent::new(
            ORDER_SERVICE_SOURCE,
            ORDER_PROCESSED,
            json!({"orderId": "ORD-1"}),
        );
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["source"], "order.service");
        assert_eq!(encoded["detailType"], "ORDER_PROCESSED");
        assert!(encoded.get("eventId").is_some());
        assert_eq!(event.detail_str("orderId"), Some("ORD-1"));
        assert_eq!(event.detail_str("missing"), None);
    }
}

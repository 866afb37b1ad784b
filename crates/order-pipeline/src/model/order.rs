//! An order as submitted to the ingestion queue.
//!
//! The wire format is the JSON document producers enqueue:
//!
//! ```json
//! {
//!     "orderId": "ORD-001",
//!     "customerId": "CUST-123",
//!     "items": [{"productId": "PROD-1", "quantity": 2, "price": 29.99}],
//!     "total": 59.98
//! }
//! ```
//!
//! Missing fields are rejected while decoding; [`Order::validate`] applies the business
//! rules that a well-formed document must still satisfy.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use thiserror::Error;

/// Type-safe identifier for Orders. This is the idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
}

/// Business-rule violations of a decoded order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderValidationError {
    #[error("Order must contain at least one item")]
    NoItems,
    #[error("Order total must be positive, got: {0}")]
    NonPositiveTotal(f64),
}

impl Order {
    pub fn new(order_id: &str, customer_id: &str, items: Vec<OrderItem>, total: f64) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.to_string(),
            items,
            total,
        }
    }

    /// Decodes an order from a queue message body.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Encodes the order as a queue message body.
    pub fn to_body(&self) -> String {
        // Serializing plain data with string keys cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), OrderValidationError> {
        if self.items.is_empty() {
            return Err(OrderValidationError::NoItems);
        }
        if self.total <= 0.0 || self.total.is_nan() {
            return Err(OrderValidationError::NonPositiveTotal(self.total));
        }
        Ok(())
    }

    /// Detail object of the `ORDER_PROCESSED` event.
    pub fn processed_detail(&self) -> Value {
        json!({
            "orderId": self.order_id,
            "customerId": self.customer_id,
            "status": "processed",
            "total": self.total,
            "timestamp": Utc::now().to_rfc3339(),
            "items": self.items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget(quantity: u32) -> OrderItem {
        OrderItem {
            product_id: "PROD-1".into(),
            quantity,
            price: 29.99,
        }
    }

    #[test]
    fn test_decodes_wire_format() {
        let body = r#"{"orderId":"ORD-001","customerId":"CUST-123",
            "items":[{"productId":"PROD-1","quantity":2,"price":29.99}],"total":59.98}"#;
        let order = Order::from_body(body).unwrap();
        assert_eq!(order.order_id, OrderId::from("ORD-001"));
        assert_eq!(order.items[0].quantity, 2);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_missing_field_is_a_decode_error() {
        let body = r#"{"orderId":"ORD-001","items":[],"total":1.0}"#;
        assert!(Order::from_body(body).is_err());
    }

    #[test]
    fn test_business_rules() {
        let empty = Order::new("ORD-1", "C", vec![], 10.0);
        assert_eq!(empty.validate(), Err(OrderValidationError::NoItems));

        let free = Order::new("ORD-2", "C", vec![widget(1)], 0.0);
        assert_eq!(
            free.validate(),
            Err(OrderValidationError::NonPositiveTotal(0.0))
        );
    }

    #[test]
    fn test_processed_detail_shape() {
        let order = Order::new("ORD-3", "CUST-9", vec![widget(2)], 59.98);
        let detail = order.processed_detail();
        assert_eq!(detail["orderId"], "ORD-3");
        assert_eq!(detail["status"], "processed");
        assert_eq!(detail["items"][0]["productId"], "PROD-1");
    }
}

//! The business step of order processing.

use crate::model::{Order, OrderValidationError};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandlerError {
    #[error("Invalid order: {0}")]
    Invalid(#[from] OrderValidationError),

    /// A downstream system refused the order. Treated as transient.
    #[error("Order rejected: {0}")]
    Rejected(String),
}

/// Applies the business effects of an order (inventory, payment, ...).
///
/// Called at most once per order id that completes successfully; the processor's
/// idempotency marker skips it on redelivery.
#[async_trait]
pub trait OrderHandler: Send + Sync + 'static {
    async fn handle(&self, order: &Order) -> Result<(), HandlerError>;
}

/// Default handler: checks the business rules and logs the order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatingHandler;

#[async_trait]
impl OrderHandler for ValidatingHandler {
    async fn handle(&self, order: &Order) -> Result<(), HandlerError> {
        order.validate()?;
        info!(
            order_id = %order.order_id,
            customer_id = %order.customer_id,
            items = order.items.len(),
            total = order.total,
            "Order validated"
        );
        Ok(())
    }
}

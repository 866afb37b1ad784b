//! Partial-batch failure reporting.

use crate::model::MessageId;
use serde::{Deserialize, Serialize};

/// Result of one batch: the messages that must stay retryable.
///
/// Everything in the batch not listed here was acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<MessageId>,
}

impl BatchResponse {
    pub fn is_success(&self) -> bool {
        self.batch_item_failures.is_empty()
    }

    pub fn failed(&self, id: &MessageId) -> bool {
        self.batch_item_failures.contains(id)
    }
}

//! Event patterns.

use crate::model::DomainEvent;
use std::collections::BTreeSet;

/// Allowed `source` values and allowed `detailType` values. An empty set matches anything.
///
/// ```rust
/// use order_pipeline::router_actor::EventPattern;
///
/// let pattern = EventPattern::new()
///     .source("order.service")
///     .detail_type("ORDER_PROCESSED");
/// assert!(pattern.accepts("order.service", "ORDER_PROCESSED"));
/// assert!(!pattern.accepts("billing.service", "ORDER_PROCESSED"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPattern {
    pub sources: BTreeSet<String>,
    pub detail_types: BTreeSet<String>,
}

impl EventPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.insert(source.into());
        self
    }

    pub fn detail_type(mut self, detail_type: impl Into<String>) -> Self {
        self.detail_types.insert(detail_type.into());
        self
    }

    pub fn accepts(&self, source: &str, detail_type: &str) -> bool {
        (self.sources.is_empty() || self.sources.contains(source))
            && (self.detail_types.is_empty() || self.detail_types.contains(detail_type))
    }

    pub fn matches(&self, event: &DomainEvent) -> bool {
        self.accepts(&event.source, &event.detail_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sets_are_wildcards() {
        let any = EventPattern::new();
        assert!(any.accepts("anything", "AT_ALL"));

        let any_order_event = EventPattern::new().source("order.service");
        assert!(any_order_event.accepts("order.service", "ORDER_SHIPPED"));
        assert!(!any_order_event.accepts("inventory.service", "ORDER_SHIPPED"));
    }

    #[test]
    fn test_multiple_values_are_alternatives() {
        let pattern = EventPattern::new()
            .source("order.service")
            .detail_type("ORDER_PROCESSED")
            .detail_type("ORDER_SHIPPED");
        assert!(pattern.accepts("order.service", "ORDER_SHIPPED"));
        assert!(!pattern.accepts("order.service", "ORDER_CANCELLED"));
    }
}

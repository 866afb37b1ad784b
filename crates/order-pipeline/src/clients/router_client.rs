//! # Router Client
//!
//! Provides a high-level API for interacting with the Router actor.
use crate::model::DomainEvent;
use crate::router_actor::{
    EventPattern, RouterError, RouterRequest, RuleId, RuleSummary, RuleTarget, TargetStats,
};
use actor_runtime::{ActorClient, ActorError, Mailbox};
use async_trait::async_trait;
use tracing::instrument;

/// Client for interacting with the Router actor.
#[derive(Clone, Debug)]
pub struct RouterClient {
    mailbox: Mailbox<RouterRequest>,
}

#[async_trait]
impl ActorClient for RouterClient {
    type Request = RouterRequest;
    type Error = RouterError;

    fn mailbox(&self) -> &Mailbox<RouterRequest> {
        &self.mailbox
    }

    fn map_error(e: ActorError) -> Self::Error {
        RouterError::from(e)
    }
}

impl RouterClient {
    pub fn new(mailbox: Mailbox<RouterRequest>) -> Self {
        Self { mailbox }
    }

    /// Creates or updates the rule called `name`. Safe to call repeatedly.
    #[instrument(skip(self, pattern))]
    pub async fn put_rule(&self, name: &str, pattern: EventPattern) -> Result<RuleId, RouterError> {
        let name = name.to_string();
        self.request(|respond_to| RouterRequest::PutRule {
            name,
            pattern,
            respond_to,
        })
        .await?
    }

    #[instrument(skip(self))]
    pub async fn delete_rule(&self, rule_id: RuleId) -> Result<(), RouterError> {
        self.request(move |respond_to| RouterRequest::DeleteRule {
            rule_id,
            respond_to,
        })
        .await?
    }

    #[instrument(skip(self, targets), fields(count = targets.len()))]
    pub async fn put_targets(
        &self,
        rule_id: RuleId,
        targets: Vec<RuleTarget>,
    ) -> Result<(), RouterError> {
        self.request(move |respond_to| RouterRequest::PutTargets {
            rule_id,
            targets,
            respond_to,
        })
        .await?
    }

    pub async fn remove_targets(
        &self,
        rule_id: RuleId,
        target_ids: Vec<String>,
    ) -> Result<usize, RouterError> {
        self.request(move |respond_to| RouterRequest::RemoveTargets {
            rule_id,
            target_ids,
            respond_to,
        })
        .await?
    }

    pub async fn list_rules(&self) -> Result<Vec<RuleSummary>, RouterError> {
        self.request(|respond_to| RouterRequest::ListRules { respond_to })
            .await
    }

    /// Routes events and returns the number of rule matches.
    pub async fn put_events(&self, events: Vec<DomainEvent>) -> Result<usize, RouterError> {
        self.request(|respond_to| RouterRequest::PutEvents { events, respond_to })
            .await
    }

    #[instrument(skip(self, event), fields(event_id = %event.event_id, detail_type = %event.detail_type))]
    pub async fn put_event(&self, event: DomainEvent) -> Result<usize, RouterError> {
        self.put_events(vec![event]).await
    }

    pub async fn target_stats(&self) -> Result<Vec<TargetStats>, RouterError> {
        self.request(|respond_to| RouterRequest::TargetStats { respond_to })
            .await
    }

    /// Waits until every delivery started so far has finished, retries included.
    pub async fn flush(&self) -> Result<(), RouterError> {
        self.request(|respond_to| RouterRequest::Flush { respond_to })
            .await
    }
}

//! [`ActorBehavior`] implementation for [`RouterState`].
//!
//! Routing is a pure function of the rule set; delivery is not. Every (rule, target) pair an
//! event matches gets its own task running [`deliver_with_retry`], so a failing or slow target
//! costs the others nothing.

use super::{
    deliver_with_retry, EventPattern, RouterError, RouterRequest, RuleId, RuleSummary,
    RuleTarget, TargetCounters, TargetStats,
};
use crate::config::RouterConfig;
use crate::model::DomainEvent;
use actor_runtime::ActorBehavior;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};

struct Rule {
    id: RuleId,
    name: String,
    pattern: EventPattern,
    targets: Vec<RuleTarget>,
}

/// The state owned by the router actor.
pub struct RouterState {
    config: RouterConfig,
    rules: Vec<Rule>,
    counters: HashMap<(RuleId, String), Arc<TargetCounters>>,
    deliveries: JoinSet<bool>,
}

impl RouterState {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
            counters: HashMap::new(),
            deliveries: JoinSet::new(),
        }
    }

    fn rule_mut(&mut self, rule_id: RuleId) -> Result<&mut Rule, RouterError> {
        self.rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or(RouterError::RuleNotFound(rule_id))
    }

    fn put_rule(&mut self, name: String, pattern: EventPattern) -> Result<RuleId, RouterError> {
        if name.trim().is_empty() {
            return Err(RouterError::EmptyRuleName);
        }
        if let Some(existing) = self.rules.iter_mut().find(|r| r.name == name) {
            if existing.pattern != pattern {
                info!(bus = %self.config.bus_name, rule = %name, "Rule pattern updated");
                existing.pattern = pattern;
            }
            return Ok(existing.id);
        }
        let id = RuleId::new();
        info!(bus = %self.config.bus_name, rule = %name, rule_id = %id, "Rule created");
        self.rules.push(Rule {
            id,
            name,
            pattern,
            targets: Vec::new(),
        });
        Ok(id)
    }

    fn delete_rule(&mut self, rule_id: RuleId) -> Result<(), RouterError> {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != rule_id);
        if self.rules.len() == before {
            return Err(RouterError::RuleNotFound(rule_id));
        }
        self.counters.retain(|(rule, _), _| *rule != rule_id);
        info!(bus = %self.config.bus_name, rule_id = %rule_id, "Rule deleted");
        Ok(())
    }

    fn put_targets(&mut self, rule_id: RuleId, targets: Vec<RuleTarget>) -> Result<(), RouterError> {
        let rule = self.rule_mut(rule_id)?;
        for target in targets {
            match rule.targets.iter_mut().find(|t| t.id == target.id) {
                Some(existing) => *existing = target,
                None => rule.targets.push(target),
            }
        }
        let count = rule.targets.len();
        info!(rule_id = %rule_id, targets = count, "Targets updated");
        Ok(())
    }

    fn remove_targets(
        &mut self,
        rule_id: RuleId,
        target_ids: Vec<String>,
    ) -> Result<usize, RouterError> {
        let rule = self.rule_mut(rule_id)?;
        let before = rule.targets.len();
        rule.targets.retain(|t| !target_ids.contains(&t.id));
        let removed = before - rule.targets.len();
        self.counters
            .retain(|(rule, target), _| *rule != rule_id || !target_ids.contains(target));
        Ok(removed)
    }

    fn list_rules(&self) -> Vec<RuleSummary> {
        self.rules
            .iter()
            .map(|r| RuleSummary {
                id: r.id,
                name: r.name.clone(),
                pattern: r.pattern.clone(),
                target_ids: r.targets.iter().map(|t| t.id.clone()).collect(),
            })
            .collect()
    }

    fn put_events(&mut self, events: Vec<DomainEvent>) -> usize {
        let mut matched = 0;
        for event in events {
            let event = Arc::new(event);
            let mut dispatched = 0;
            for rule in self.rules.iter().filter(|r| r.pattern.matches(&event)) {
                matched += 1;
                for target in &rule.targets {
                    let counters = Arc::clone(
                        self.counters
                            .entry((rule.id, target.id.clone()))
                            .or_default(),
                    );
                    self.deliveries.spawn(deliver_with_retry(
                        target.clone(),
                        Arc::clone(&event),
                        self.config.clone(),
                        counters,
                    ));
                    dispatched += 1;
                }
            }
            if dispatched == 0 {
                debug!(event_id = %event.event_id, source = %event.source, detail_type = %event.detail_type, "No matching target, event dropped");
            } else {
                info!(event_id = %event.event_id, detail_type = %event.detail_type, dispatched, "Event routed");
            }
        }
        matched
    }

    fn target_stats(&self) -> Vec<TargetStats> {
        let mut stats = Vec::new();
        for rule in &self.rules {
            for target in &rule.targets {
                let (delivered, retried, exhausted) = self
                    .counters
                    .get(&(rule.id, target.id.clone()))
                    .map(|c| {
                        (
                            c.delivered.load(Ordering::Relaxed),
                            c.retried.load(Ordering::Relaxed),
                            c.exhausted.load(Ordering::Relaxed),
                        )
                    })
                    .unwrap_or_default();
                stats.push(TargetStats {
                    rule: rule.name.clone(),
                    target: target.id.clone(),
                    destination: target.destination().to_string(),
                    delivered,
                    retried,
                    exhausted,
                });
            }
        }
        stats
    }

    fn reap_finished(&mut self) {
        while self.deliveries.try_join_next().is_some() {}
    }

    async fn drain(&mut self) {
        while self.deliveries.join_next().await.is_some() {}
    }
}

#[async_trait]
impl ActorBehavior for RouterState {
    type Request = RouterRequest;
    type Context = ();

    fn name(&self) -> &str {
        &self.config.bus_name
    }

    async fn handle(&mut self, request: RouterRequest, _ctx: &()) {
        self.reap_finished();
        match request {
            RouterRequest::PutRule {
                name,
                pattern,
                respond_to,
            } => {
                let _ = respond_to.send(self.put_rule(name, pattern));
            }
            RouterRequest::DeleteRule {
                rule_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.delete_rule(rule_id));
            }
            RouterRequest::PutTargets {
                rule_id,
                targets,
                respond_to,
            } => {
                let _ = respond_to.send(self.put_targets(rule_id, targets));
            }
            RouterRequest::RemoveTargets {
                rule_id,
                target_ids,
                respond_to,
            } => {
                let _ = respond_to.send(self.remove_targets(rule_id, target_ids));
            }
            RouterRequest::ListRules { respond_to } => {
                let _ = respond_to.send(self.list_rules());
            }
            RouterRequest::PutEvents { events, respond_to } => {
                let _ = respond_to.send(self.put_events(events));
            }
            RouterRequest::TargetStats { respond_to } => {
                let _ = respond_to.send(self.target_stats());
            }
            RouterRequest::Flush { respond_to } => {
                self.drain().await;
                let _ = respond_to.send(());
            }
        }
    }

    async fn on_stop(&mut self, _ctx: &()) {
        self.drain().await;
        info!(bus = %self.config.bus_name, rules = self.rules.len(), "Router stopped");
    }
}

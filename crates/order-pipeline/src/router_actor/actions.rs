//! Requests understood by the Router actor.

use super::{EventPattern, RouterError, RuleTarget, TargetStats};
use crate::model::DomainEvent;
use actor_runtime::Response;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Type-safe identifier for routing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub Uuid);

impl RuleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule_{}", self.0.simple())
    }
}

#[derive(Debug)]
pub enum RouterRequest {
    /// Creates the rule, or updates the pattern of the rule with the same name.
    PutRule {
        name: String,
        pattern: EventPattern,
        respond_to: Response<Result<RuleId, RouterError>>,
    },
    DeleteRule {
        rule_id: RuleId,
        respond_to: Response<Result<(), RouterError>>,
    },
    /// Adds targets to a rule, replacing any with the same target id.
    PutTargets {
        rule_id: RuleId,
        targets: Vec<RuleTarget>,
        respond_to: Response<Result<(), RouterError>>,
    },
    /// Removes targets by id. Answers with the number removed.
    RemoveTargets {
        rule_id: RuleId,
        target_ids: Vec<String>,
        respond_to: Response<Result<usize, RouterError>>,
    },
    ListRules {
        respond_to: Response<Vec<RuleSummary>>,
    },
    /// Routes events. Answers with the number of rule matches, before delivery completes.
    PutEvents {
        events: Vec<DomainEvent>,
        respond_to: Response<usize>,
    },
    TargetStats {
        respond_to: Response<Vec<TargetStats>>,
    },
    /// Waits for every delivery started so far to finish.
    Flush { respond_to: Response<()> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSummary {
    pub id: RuleId,
    pub name: String,
    pub pattern: EventPattern,
    pub target_ids: Vec<String>,
}

//! # Router Actor
//!
//! The event bus. Holds named rules; each rule pairs an [`EventPattern`] with an ordered list
//! of [`RuleTarget`]s. Every event is evaluated against every rule and forwarded to all targets
//! of all matching rules. Events nothing matches are dropped without error.
//!
//! ## Structure
//!
//! - [`entity`] - [`RouterState`] and its [`ActorBehavior`](actor_runtime::ActorBehavior) implementation
//! - [`actions`] - [`RouterRequest`], [`RuleId`] and [`RuleSummary`]
//! - [`pattern`] - [`EventPattern`] matching
//! - [`target`] - [`RuleTarget`] and the retrying delivery loop
//! - [`error`] - [`RouterError`] type for type-safe error handling
//!
//! ## Delivery Guarantees
//!
//! At least once per target, unordered across targets. A target that keeps failing is retried
//! with exponential backoff up to the configured attempt budget, then counted as exhausted in
//! [`TargetStats`].

pub mod actions;
pub mod entity;
pub mod error;
pub mod pattern;
pub mod target;

pub use actions::*;
pub use entity::*;
pub use error::*;
pub use pattern::*;
pub use target::*;

use crate::clients::RouterClient;
use crate::config::RouterConfig;
use actor_runtime::Actor;

/// Creates a new Router actor and its client.
pub fn new(config: RouterConfig) -> (Actor<RouterState>, RouterClient) {
    let (actor, mailbox) = Actor::new(RouterState::new(config), 64);
    (actor, RouterClient::new(mailbox))
}

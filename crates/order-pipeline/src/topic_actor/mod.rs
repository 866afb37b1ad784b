//! # Topic Actor
//!
//! A fanout point: every published notification goes, independently, to each confirmed
//! subscription whose filter policy matches.
//!
//! ## Structure
//!
//! - [`entity`] - [`TopicState`] and its [`ActorBehavior`](actor_runtime::ActorBehavior) implementation
//! - [`actions`] - [`TopicRequest`] and [`PublishReceipt`]
//! - [`endpoint`] - the [`Endpoint`] seam and the built-in endpoints
//! - [`error`] - [`TopicError`] and [`EndpointError`]
//!
//! ## Confirmation
//!
//! Email and http subscriptions start out pending. The topic sends them a
//! `SubscriptionConfirmation` carrying a token and withholds live traffic until
//! [`TopicClient::confirm_subscription`](crate::clients::TopicClient::confirm_subscription)
//! is called with that token. Queue and channel subscriptions are confirmed on creation.

pub mod actions;
pub mod endpoint;
pub mod entity;
pub mod error;

pub use actions::*;
pub use endpoint::*;
pub use entity::*;
pub use error::*;

use crate::clients::TopicClient;
use actor_runtime::Actor;

/// Creates a new Topic actor and its client.
pub fn new(name: &str) -> (Actor<TopicState>, TopicClient) {
    let (actor, mailbox) = Actor::new(TopicState::new(name), 32);
    (actor, TopicClient::new(name, mailbox))
}

//! # Queue Actor
//!
//! An at-least-once, unordered message queue with visibility leases. The same actor serves as
//! the ingestion queue, the dead-letter queue and the audit sink; only the configuration
//! differs.
//!
//! ## Structure
//!
//! - [`entity`] - [`QueueState`] and its [`ActorBehavior`](actor_runtime::ActorBehavior) implementation
//! - [`actions`] - [`QueueRequest`] and [`QueueAttributes`]
//! - [`error`] - [`QueueError`] type for type-safe error handling
//! - [`new()`] - Factory function that creates the actor and client
//!
//! ## Message Lifecycle
//!
//! ```text
//! send ──► visible ──receive──► in flight ──acknowledge──► deleted
//!             ▲                    │
//!             └──lease expired─────┤
//!                                  └──lease expired, receives exhausted──► dead-letter queue
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use order_pipeline::config::QueueConfig;
//! use order_pipeline::queue_actor::{self, QueueContext};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (actor, queue) = queue_actor::new(QueueConfig::new("Orders"));
//!     tokio::spawn(actor.run(QueueContext::default()));
//!
//!     let id = queue.send(r#"{"orderId":"ORD-1"}"#).await?;
//!     let batch = queue.receive_batch(10, Duration::from_secs(1)).await?;
//!     assert_eq!(batch[0].id, id);
//!     queue.acknowledge(batch[0].receipt()?).await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use entity::*;
pub use error::*;

use crate::clients::QueueClient;
use crate::config::QueueConfig;
use actor_runtime::Actor;
use std::sync::Arc;
use tokio::sync::Notify;

/// Largest message body accepted by `send`.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// Most messages a single receive can return.
pub const MAX_BATCH_SIZE: usize = 10;

/// Creates a new Queue actor and its client.
pub fn new(config: QueueConfig) -> (Actor<QueueState>, QueueClient) {
    let arrivals = Arc::new(Notify::new());
    let name = config.name.clone();
    let (actor, mailbox) = Actor::new(QueueState::new(config, Arc::clone(&arrivals)), 64);
    (actor, QueueClient::new(name, mailbox, arrivals))
}

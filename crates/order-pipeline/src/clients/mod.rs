//! # Clients
//!
//! Type-safe handles for the pipeline's actors. Each wraps a
//! [`Mailbox`](actor_runtime::Mailbox), implements [`ActorClient`](actor_runtime::ActorClient)
//! for the request plumbing, and exposes domain methods returning the component's own error
//! type.

pub mod monitor_client;
pub mod queue_client;
pub mod router_client;
pub mod topic_client;

pub use monitor_client::MonitorClient;
pub use queue_client::QueueClient;
pub use router_client::RouterClient;
pub use topic_client::TopicClient;

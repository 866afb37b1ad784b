//! # Actor Runtime
//!
//! This crate provides the building blocks the order pipeline uses to run each stateful
//! component (queues, topic, router) as an isolated actor on top of Tokio.
//!
//! ## Why actors?
//!
//! Every mutable piece of the pipeline (a queue's visible set, its in-flight leases, a topic's
//! subscriptions) is owned by exactly one task. Requests arrive over an mpsc channel and are
//! handled **one at a time**, so operations like "lease the next visible message" are atomic
//! with respect to every other caller without a single lock.
//!
//! - Isolated state (no shared memory, no locks)
//! - Message-passing concurrency
//! - Sequential processing within each actor eliminates race conditions
//!
//! **Further Reading**:
//! - [Actor Model (Wikipedia)](https://en.wikipedia.org/wiki/Actor_model)
//! - [Actors in Rust](https://ryhl.io/blog/actors-with-tokio/) - Practical guide to implementing actors with Tokio
//!
//! ## Architecture Overview
//!
//! The runtime separates concerns into three layers:
//!
//! 1. **Behavior Layer** ([`ActorBehavior`]) - the component's state and request handling
//! 2. **Runtime Layer** ([`Actor`]) - the message loop, periodic ticks and shutdown
//! 3. **Interface Layer** ([`Mailbox`], [`ActorClient`]) - type-safe request/response calls
//!
//! ## Example
//!
//! ```rust
//! use actor_runtime::{Actor, ActorBehavior, Mailbox, Response};
//! use async_trait::async_trait;
//!
//! #[derive(Debug)]
//! enum CounterRequest {
//!     Add { amount: u64, respond_to: Response<u64> },
//! }
//!
//! struct Counter { total: u64 }
//!
//! #[async_trait]
//! impl ActorBehavior for Counter {
//!     type Request = CounterRequest;
//!     type Context = ();
//!
//!     fn name(&self) -> &str { "counter" }
//!
//!     async fn handle(&mut self, request: CounterRequest, _ctx: &()) {
//!         match request {
//!             CounterRequest::Add { amount, respond_to } => {
//!                 self.total += amount;
//!                 let _ = respond_to.send(self.total);
//!             }
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, mailbox) = Actor::new(Counter { total: 0 }, 8);
//!     tokio::spawn(actor.run(()));
//!
//!     let total = mailbox
//!         .call(|respond_to| CounterRequest::Add { amount: 2, respond_to })
//!         .await
//!         .unwrap();
//!     assert_eq!(total, 2);
//! }
//! ```
//!
//! ## Context Injection Pattern
//!
//! Dependencies are injected at **runtime** via [`Actor::run`], not at construction time.
//! The ingestion queue, for example, receives the dead-letter queue's client as its context,
//! which lets the system create every actor first and wire them afterwards.
//!
//! ## Periodic Work
//!
//! A behavior that returns `Some(period)` from [`ActorBehavior::tick_interval`] gets
//! [`ActorBehavior::on_tick`] called on that cadence, interleaved with requests. Queues use it
//! to reap expired visibility leases.
//!
//! ## Testing
//!
//! [`mock::MockMailbox`] answers requests from a script of expectations so a client or a
//! component that depends on one can be tested without spawning the real actor.

pub mod actor;
pub mod behavior;
pub mod client;
pub mod client_trait;
pub mod error;
pub mod message;
pub mod mock;
pub mod tracing;

pub use actor::Actor;
pub use behavior::ActorBehavior;
pub use client::Mailbox;
pub use client_trait::ActorClient;
pub use error::ActorError;
pub use message::Response;
